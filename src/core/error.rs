use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    Connect,
    Schema,
    Store,
    Usage,
    Internal,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    sheet: Option<String>,
    row: Option<usize>,
    column: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            sheet: None,
            row: None,
            column: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn with_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(sheet) = &self.sheet {
            write!(f, " (sheet: {sheet})")?;
        }
        if let Some(row) = self.row {
            write!(f, " (row: {row})")?;
        }
        if let Some(column) = &self.column {
            write!(f, " (column: {column})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind};

    #[test]
    fn display_includes_context() {
        let err = Error::new(ErrorKind::Store)
            .with_message("write failed")
            .with_sheet("users")
            .with_row(4)
            .with_column("name");
        let rendered = err.to_string();
        assert!(rendered.contains("Store"));
        assert!(rendered.contains("write failed"));
        assert!(rendered.contains("sheet: users"));
        assert!(rendered.contains("row: 4"));
        assert!(rendered.contains("column: name"));
    }

    #[test]
    fn kind_is_preserved() {
        assert_eq!(Error::new(ErrorKind::Schema).kind(), ErrorKind::Schema);
        assert_eq!(Error::new(ErrorKind::Connect).kind(), ErrorKind::Connect);
    }
}
