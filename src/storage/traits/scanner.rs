// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Scanner trait for iterating over range source rows

use std::sync::Arc;

use crate::core::{Error, Result, Row};

/// Scanner provides a restartable iterator over the rows of a range source
///
/// `next()` advances to the next row and `row()` returns the current row.
/// `position()` identifies the current row within the source and is stable
/// across `reset()`.
///
/// # Example
///
/// ```ignore
/// let mut scanner = source.open(&ctx)?;
/// while scanner.next() {
///     let row = scanner.row();
///     // Process row...
/// }
/// if let Some(err) = scanner.err() {
///     // Handle error...
/// }
/// scanner.close()?;
/// ```
pub trait Scanner: Send {
    /// Advances the scanner to the next row
    ///
    /// After returning `false`, the caller should check `err()` to see if
    /// iteration stopped due to an error.
    fn next(&mut self) -> bool;

    /// Returns the current row
    fn row(&self) -> &Row;

    /// Position of the current row within the source
    fn position(&self) -> usize;

    /// Rewinds to before the first row
    fn reset(&mut self) -> Result<()>;

    /// Returns any error that occurred during scanning
    fn err(&self) -> Option<&Error>;

    /// Closes the scanner and releases any resources
    fn close(&mut self) -> Result<()>;
}

/// A scanner over a shared vector of rows
pub struct VecScanner {
    rows: Arc<Vec<Row>>,
    current_index: Option<usize>,
    empty_row: Row,
    error: Option<Error>,
    closed: bool,
}

impl VecScanner {
    /// Creates a new scanner over the given rows
    pub fn new(rows: Vec<Row>) -> Self {
        Self::shared(Arc::new(rows))
    }

    /// Creates a scanner over a shared row snapshot
    pub fn shared(rows: Arc<Vec<Row>>) -> Self {
        Self {
            rows,
            current_index: None,
            empty_row: Row::new(),
            error: None,
            closed: false,
        }
    }

    /// Creates a scanner that will return an error
    pub fn with_error(error: Error) -> Self {
        Self {
            error: Some(error),
            ..Self::new(Vec::new())
        }
    }
}

impl Scanner for VecScanner {
    fn next(&mut self) -> bool {
        if self.closed || self.error.is_some() {
            return false;
        }

        let next_index = match self.current_index {
            None => 0,
            Some(i) => i + 1,
        };

        if next_index < self.rows.len() {
            self.current_index = Some(next_index);
            true
        } else {
            self.current_index = Some(self.rows.len());
            false
        }
    }

    fn row(&self) -> &Row {
        match self.current_index {
            Some(i) if i < self.rows.len() => &self.rows[i],
            _ => &self.empty_row,
        }
    }

    fn position(&self) -> usize {
        self.current_index.unwrap_or(0)
    }

    fn reset(&mut self) -> Result<()> {
        if self.closed {
            return Err(Error::internal("scanner closed"));
        }
        self.current_index = None;
        Ok(())
    }

    fn err(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    #[test]
    fn test_vec_scanner_empty() {
        let mut scanner = VecScanner::new(vec![]);
        assert!(!scanner.next());
        assert!(scanner.err().is_none());
        assert!(scanner.row().is_empty());
    }

    #[test]
    fn test_vec_scanner_with_rows_and_reset() {
        let rows = vec![
            Row::from_values(vec![Value::Integer(1), Value::text("a")]),
            Row::from_values(vec![Value::Integer(2), Value::text("b")]),
        ];

        let mut scanner = VecScanner::new(rows);

        assert!(scanner.next());
        assert_eq!(scanner.row().get(0), Some(&Value::Integer(1)));
        assert_eq!(scanner.position(), 0);

        assert!(scanner.next());
        assert_eq!(scanner.position(), 1);
        assert!(!scanner.next());
        assert!(!scanner.next());

        scanner.reset().unwrap();
        assert!(scanner.next());
        assert_eq!(scanner.row().get(1), Some(&Value::text("a")));
    }

    #[test]
    fn test_vec_scanner_with_error() {
        let mut scanner = VecScanner::with_error(Error::internal("test error"));
        assert!(!scanner.next());
        assert!(scanner.err().is_some());
    }

    #[test]
    fn test_vec_scanner_close() {
        let mut scanner = VecScanner::new(vec![Row::from_values(vec![Value::Integer(1)])]);
        assert!(scanner.next());
        assert!(scanner.close().is_ok());
        assert!(!scanner.next());
        assert!(scanner.reset().is_err());
    }
}
