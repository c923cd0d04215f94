//! JSONL reading operations.
//!
//! This module provides async functionality for reading JSONL files line-by-line
//! with efficient buffering and line number tracking for error reporting.

use crate::warning::{Warning, WarningCollector};
use crate::{Error, Result};
use futures::stream::Stream;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// Async reader for JSONL (JSON Lines) data.
///
/// `JsonlReader` wraps an async reader and provides buffered reading of JSONL
/// formatted data. It tracks line numbers to provide useful context in error
/// messages when parsing fails.
///
/// # Type Parameters
///
/// * `R` - The underlying async reader type. Must implement [`AsyncRead`] and [`Unpin`].
///
/// # Examples
///
/// ```no_run
/// use keelson_jsonl::reader::JsonlReader;
/// use tokio::fs::File;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let file = File::open("data.jsonl").await?;
/// let reader = JsonlReader::new(file);
/// // Use reader to parse JSONL data...
/// # Ok(())
/// # }
/// ```
pub struct JsonlReader<R> {
    /// Buffered reader wrapping the underlying async reader.
    reader: BufReader<R>,
    /// Current line number (1-based counting, 0 before any lines are read) for error reporting.
    line_number: usize,
}

impl<R: AsyncRead + Unpin> JsonlReader<R> {
    /// Creates a new `JsonlReader` wrapping the given async reader.
    ///
    /// The reader is wrapped in a [`BufReader`] for efficient buffered I/O.
    /// Line numbering uses 1-based indexing: the counter starts at 0 and increments
    /// after each line is read, so the first line read is numbered 1.
    ///
    /// # Arguments
    ///
    /// * `reader` - The underlying async reader to wrap.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use keelson_jsonl::reader::JsonlReader;
    /// use tokio::fs::File;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let file = File::open("data.jsonl").await?;
    /// let reader = JsonlReader::new(file);
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line_number: 0,
        }
    }

    /// Creates a new `JsonlReader` with a custom buffer capacity.
    ///
    /// This is useful when you know the typical line length of your JSONL data
    /// and want to optimize buffer allocation.
    ///
    /// # Arguments
    ///
    /// * `reader` - The underlying async reader to wrap.
    /// * `capacity` - The initial buffer capacity in bytes.
    #[must_use]
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            line_number: 0,
        }
    }

    /// Returns the current line number.
    ///
    /// Returns 0 before any lines have been read. After reading, returns the
    /// 1-based line number of the last line read (first line = 1, second line = 2, etc.).
    #[must_use]
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Increments the line number counter.
    ///
    /// This should be called after successfully reading a line.
    #[cfg_attr(
        not(test),
        expect(
            dead_code,
            reason = "Will be used by read_line methods in future commits"
        )
    )]
    pub(crate) fn increment_line(&mut self) {
        self.line_number += 1;
    }

    /// Returns a reference to the underlying buffered reader.
    ///
    /// This provides access to the `BufReader` for advanced operations.
    #[must_use]
    pub fn get_ref(&self) -> &BufReader<R> {
        &self.reader
    }

    /// Returns a mutable reference to the underlying buffered reader.
    ///
    /// Use with caution: reading directly from the buffer may cause
    /// line number tracking to become inaccurate.
    pub fn get_mut(&mut self) -> &mut BufReader<R> {
        &mut self.reader
    }

    /// Consumes the reader, returning the underlying buffered reader.
    #[must_use]
    pub fn into_inner(self) -> BufReader<R> {
        self.reader
    }

    /// Reads a single line from the JSONL data and deserializes it.
    ///
    /// This method reads the next non-empty line, increments the line counter,
    /// and deserializes the JSON content into the specified type.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))` - Successfully read and deserialized a record
    /// - `Ok(None)` - End of file reached
    /// - `Err(Error::Io(_))` - I/O error during reading
    /// - `Err(Error::Json(_))` - JSON parsing error
    ///
    /// # Type Parameters
    ///
    /// * `T` - The type to deserialize each JSON line into. Must implement
    ///   [`DeserializeOwned`].
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use keelson_jsonl::JsonlReader;
    /// use serde::Deserialize;
    /// use tokio::fs::File;
    ///
    /// #[derive(Deserialize)]
    /// struct Record {
    ///     id: u32,
    ///     name: String,
    /// }
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let file = File::open("data.jsonl").await?;
    /// let mut reader = JsonlReader::new(file);
    ///
    /// while let Some(record) = reader.read_line::<Record>().await? {
    ///     println!("Read record: {}", record.name);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn read_line<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = self.reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                return Ok(None);
            }

            self.line_number += 1;

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let value: T = serde_json::from_str(trimmed)
                .map_err(|e| Error::InvalidFormat(format!("line {}: {}", self.line_number, e)))?;

            return Ok(Some(value));
        }
    }

    /// Returns an async [`Stream`] of deserialized records from the JSONL data.
    ///
    /// This method consumes the reader and returns a stream that lazily reads
    /// and deserializes records on demand. This enables efficient processing of
    /// large JSONL files with constant memory usage, as only one record is held
    /// in memory at a time.
    ///
    /// # Type Parameters
    ///
    /// * `T` - The type to deserialize each JSON line into. Must implement
    ///   [`DeserializeOwned`] and `'static` (required by the stream implementation).
    ///
    /// # Returns
    ///
    /// An async stream that yields `Result<T>` for each line:
    /// - `Ok(T)` - Successfully read and deserialized a record
    /// - `Err(Error)` - I/O or JSON parsing error
    ///
    /// The stream terminates (returns `None`) when EOF is reached.
    ///
    /// # Stream Behavior
    ///
    /// - Uses [`futures::stream::unfold`] for lazy evaluation
    /// - Memory usage is constant regardless of file size
    /// - Errors are propagated through the stream (not short-circuited)
    /// - After an error, the stream continues attempting to read subsequent lines
    ///
    /// # When to Use
    ///
    /// - **Use `stream()`** for declarative stream processing with combinators
    ///   (filter, map, take, etc.) and when working with large files where constant
    ///   memory usage is important
    /// - **Use `read_line()`** for imperative-style processing with explicit
    ///   control flow and error handling, or when reading a small number of records
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use keelson_jsonl::JsonlReader;
    /// use futures::stream::StreamExt;
    /// use serde::Deserialize;
    /// use std::pin::pin;
    /// use tokio::fs::File;
    ///
    /// #[derive(Deserialize)]
    /// struct Record {
    ///     id: u32,
    ///     name: String,
    /// }
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let file = File::open("data.jsonl").await?;
    /// let reader = JsonlReader::new(file);
    /// // Pin the stream to use with StreamExt methods
    /// let mut stream = pin!(reader.stream::<Record>());
    ///
    /// while let Some(result) = stream.next().await {
    ///     match result {
    ///         Ok(record) => println!("Read record: {}", record.name),
    ///         Err(e) => eprintln!("Error: {}", e),
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn stream<T>(self) -> impl Stream<Item = Result<T>>
    where
        T: DeserializeOwned + 'static,
    {
        futures::stream::unfold(self, |mut reader| async move {
            match reader.read_line().await {
                Ok(Some(value)) => Some((Ok(value), reader)),
                Ok(None) => None,
                Err(e) => Some((Err(e), reader)),
            }
        })
    }

    /// Returns an async [`Stream`] that continues reading despite malformed JSON lines.
    ///
    /// Unlike [`stream()`](Self::stream), this method provides resilient loading behavior:
    /// when a line contains malformed JSON, the error is collected as a warning and
    /// processing continues with the next line. Only successfully parsed records are
    /// yielded by the stream.
    ///
    /// This is useful when processing JSONL files that may contain occasional corruption
    /// or invalid entries, and you want to recover as much valid data as possible.
    ///
    /// # Type Parameters
    ///
    /// * `T` - The type to deserialize each JSON line into. Must implement
    ///   [`DeserializeOwned`] and `'static` (required by the stream implementation).
    ///
    /// # Returns
    ///
    /// A tuple containing:
    /// - An async stream that yields `T` for each successfully parsed line
    /// - A [`WarningCollector`] that accumulates warnings for malformed lines
    ///
    /// The stream terminates (returns `None`) when EOF is reached.
    ///
    /// # Warning Collection
    ///
    /// For each malformed JSON line, a [`Warning::MalformedJson`] is added to the
    /// collector with the line number and error description. The collector is
    /// thread-safe and can be cloned, so you can inspect warnings while the stream
    /// is still being processed.
    ///
    /// # I/O Errors
    ///
    /// I/O errors (as opposed to JSON parsing errors) will terminate the stream.
    /// These are considered unrecoverable since they typically indicate problems
    /// with the underlying reader (disk failure, network error, etc.).
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use keelson_jsonl::JsonlReader;
    /// use futures::stream::StreamExt;
    /// use serde::Deserialize;
    /// use std::pin::pin;
    /// use tokio::fs::File;
    ///
    /// #[derive(Deserialize)]
    /// struct Record {
    ///     id: u32,
    ///     name: String,
    /// }
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let file = File::open("data.jsonl").await?;
    /// let reader = JsonlReader::new(file);
    /// let (stream, warnings) = reader.stream_resilient::<Record>();
    /// let mut stream = pin!(stream);
    ///
    /// while let Some(record) = stream.next().await {
    ///     println!("Read record: {} - {}", record.id, record.name);
    /// }
    ///
    /// // Check for any warnings after processing
    /// let collected_warnings = warnings.into_warnings();
    /// if !collected_warnings.is_empty() {
    ///     eprintln!("Encountered {} warnings:", collected_warnings.len());
    ///     for warning in collected_warnings {
    ///         eprintln!("  - {}", warning);
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Filtering and Transforming with Resilience
    ///
    /// ```no_run
    /// use keelson_jsonl::JsonlReader;
    /// use futures::stream::StreamExt;
    /// use serde::Deserialize;
    /// use std::pin::pin;
    /// use tokio::fs::File;
    ///
    /// #[derive(Deserialize)]
    /// struct Record { id: u32, active: bool }
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let file = File::open("data.jsonl").await?;
    /// let reader = JsonlReader::new(file);
    /// let (stream, warnings) = reader.stream_resilient::<Record>();
    ///
    /// // Filter active records - malformed lines are automatically skipped
    /// let active_records: Vec<Record> = pin!(stream)
    ///     .filter(|r| {
    ///         let is_active = r.active;
    ///         async move { is_active }
    ///     })
    ///     .collect()
    ///     .await;
    ///
    /// println!("Found {} active records with {} warnings",
    ///          active_records.len(), warnings.len());
    /// # Ok(())
    /// # }
    /// ```
    pub fn stream_resilient<T>(self) -> (impl Stream<Item = T>, WarningCollector)
    where
        T: DeserializeOwned + 'static,
    {
        let collector = WarningCollector::new();
        let collector_clone = collector.clone();

        let stream = futures::stream::unfold(
            (self, collector_clone),
            |(mut reader, warnings)| async move {
                loop {
                    // Read raw line to track line number before parsing
                    let mut line = String::new();

                    // Find next non-empty line
                    let trimmed = loop {
                        line.clear();
                        match reader.reader.read_line(&mut line).await {
                            Ok(0) => {
                                // EOF reached
                                return None;
                            }
                            Ok(_) => {
                                reader.line_number += 1;
                                let trimmed = line.trim();
                                if !trimmed.is_empty() {
                                    // Found non-empty line
                                    break trimmed;
                                }
                                // Skip empty lines and continue
                            }
                            Err(_) => {
                                // I/O errors terminate the stream
                                return None;
                            }
                        }
                    };

                    // Attempt to parse the line using trimmed value
                    match serde_json::from_str::<T>(trimmed) {
                        Ok(value) => {
                            return Some((value, (reader, warnings)));
                        }
                        Err(e) => {
                            // Collect warning and continue to next line
                            warnings.add(Warning::MalformedJson {
                                line_number: reader.line_number,
                                error: e.to_string(),
                            });
                            continue;
                        }
                    }
                }
            },
        );

        (stream, collector)
    }
}

impl<R: AsyncRead + Unpin + Default> Default for JsonlReader<R> {
    fn default() -> Self {
        Self::new(R::default())
    }
}
