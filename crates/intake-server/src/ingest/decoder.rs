//! Line-oriented record decoder
//!
//! Turns an uploaded byte stream into a lazy sequence of [`RawRecord`]s, one
//! per line after the header.
//!
//! # Delimiter selection
//!
//! The first rule that gives an answer wins:
//!
//! 1. File name suffix: `.csv` is comma separated, `.tsv`/`.tab` tab
//!    separated, `.txt`/`.dat` plain text.
//! 2. Declared content type: `text/csv` (and the usual aliases) is comma
//!    separated, `text/tab-separated-values` tab separated, `text/plain` plain
//!    text.
//! 3. The header line: a comma means comma separated, a tab means tab
//!    separated, anything else is whitespace separated.
//!
//! Plain text resolves to tab separated when the header contains a tab and to
//! whitespace separated otherwise.
//!
//! Quoted fields spanning several lines are not supported; every physical
//! line is one record.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::record::{RawRecord, RecordError, RECORD_FIELD_COUNT};

const UTF8_BOM: &str = "\u{feff}";

/// How fields are separated within a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// Comma separated with optional double quoting
    Comma,
    /// Single tab characters
    Tab,
    /// Runs of spaces and tabs
    Whitespace,
}

impl std::fmt::Display for Delimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Comma => write!(f, "comma"),
            Self::Tab => write!(f, "tab"),
            Self::Whitespace => write!(f, "whitespace"),
        }
    }
}

/// What the upload declares about itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeclaredFormat {
    Csv,
    Tsv,
    Text,
}

/// Client-supplied metadata for an uploaded file
#[derive(Debug, Clone, Default)]
pub struct UploadHint {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

impl UploadHint {
    pub fn new(file_name: Option<String>, content_type: Option<String>) -> Self {
        Self {
            file_name,
            content_type,
        }
    }

    fn declared_format(&self) -> Option<DeclaredFormat> {
        self.format_from_file_name()
            .or_else(|| self.format_from_content_type())
    }

    fn format_from_file_name(&self) -> Option<DeclaredFormat> {
        let name = self.file_name.as_deref()?;
        let (_, extension) = name.rsplit_once('.')?;
        match extension.to_ascii_lowercase().as_str() {
            "csv" => Some(DeclaredFormat::Csv),
            "tsv" | "tab" => Some(DeclaredFormat::Tsv),
            "txt" | "dat" => Some(DeclaredFormat::Text),
            _ => None,
        }
    }

    fn format_from_content_type(&self) -> Option<DeclaredFormat> {
        let mime: mime::Mime = self.content_type.as_deref()?.parse().ok()?;
        match mime.essence_str() {
            "text/csv" | "application/csv" | "application/vnd.ms-excel" => {
                Some(DeclaredFormat::Csv)
            },
            "text/tab-separated-values" => Some(DeclaredFormat::Tsv),
            "text/plain" => Some(DeclaredFormat::Text),
            _ => None,
        }
    }

    /// Pick the delimiter for this upload given its header line
    pub fn resolve_delimiter(&self, header: &str) -> Delimiter {
        match self.declared_format() {
            Some(DeclaredFormat::Csv) => Delimiter::Comma,
            Some(DeclaredFormat::Tsv) => Delimiter::Tab,
            Some(DeclaredFormat::Text) if header.contains('\t') => Delimiter::Tab,
            Some(DeclaredFormat::Text) => Delimiter::Whitespace,
            None if header.contains(',') => Delimiter::Comma,
            None if header.contains('\t') => Delimiter::Tab,
            None => Delimiter::Whitespace,
        }
    }
}

/// Decoder settings
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderOptions {
    /// Comma-separated lines must have exactly as many fields as the header
    pub strict_csv: bool,
}

/// One decoded line; per-line defects are carried in `result`
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedLine {
    pub line_number: usize,
    pub result: Result<RawRecord, RecordError>,
}

/// Streaming decoder over an uploaded file.
///
/// The header line is consumed by [`RecordDecoder::open`]; each call to
/// [`RecordDecoder::next_line`] reads one more line. The stream is consumed
/// once. I/O errors are returned as `Err` and end decoding.
pub struct RecordDecoder<R> {
    reader: R,
    delimiter: Delimiter,
    header_fields: usize,
    options: DecoderOptions,
    line_number: usize,
    buf: Vec<u8>,
}

impl<R> RecordDecoder<R>
where
    R: AsyncBufRead + Unpin,
{
    /// Consume the header line and choose the delimiter.
    pub async fn open(mut reader: R, hint: &UploadHint, options: DecoderOptions) -> io::Result<Self> {
        let mut buf = Vec::new();
        let read = reader.read_until(b'\n', &mut buf).await?;

        let header = String::from_utf8_lossy(trim_line_ending(&buf)).into_owned();
        let header = header.strip_prefix(UTF8_BOM).unwrap_or(&header);
        let delimiter = hint.resolve_delimiter(header);
        let header_fields = if read == 0 {
            0
        } else {
            split_fields(header, delimiter).map(|f| f.len()).unwrap_or(0)
        };

        tracing::debug!(
            %delimiter,
            header_fields,
            file_name = hint.file_name.as_deref().unwrap_or(""),
            content_type = hint.content_type.as_deref().unwrap_or(""),
            "Header consumed"
        );

        Ok(Self {
            reader,
            delimiter,
            header_fields,
            options,
            line_number: usize::from(read > 0),
            buf,
        })
    }

    pub fn delimiter(&self) -> Delimiter {
        self.delimiter
    }

    /// Read the next line. `Ok(None)` at end of stream.
    ///
    /// A blank or whitespace-only line carries no fields and is reported as
    /// an incomplete record.
    pub async fn next_line(&mut self) -> io::Result<Option<DecodedLine>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
            return Ok(None);
        }
        self.line_number += 1;

        let result = match std::str::from_utf8(trim_line_ending(&self.buf)) {
            Ok(line) if line.trim().is_empty() => Err(RecordError::Incomplete {
                expected: RECORD_FIELD_COUNT,
                found: 0,
            }),
            Ok(line) => self.decode(line),
            Err(e) => Err(RecordError::Malformed(format!("invalid UTF-8: {e}"))),
        };

        Ok(Some(DecodedLine {
            line_number: self.line_number,
            result,
        }))
    }

    fn decode(&self, line: &str) -> Result<RawRecord, RecordError> {
        let fields = split_fields(line, self.delimiter)?;

        if self.delimiter == Delimiter::Comma
            && self.options.strict_csv
            && fields.len() != self.header_fields
        {
            return Err(RecordError::Malformed(format!(
                "expected {} fields as in the header, found {}",
                self.header_fields,
                fields.len()
            )));
        }

        if fields.len() < RECORD_FIELD_COUNT {
            return Err(RecordError::Incomplete {
                expected: RECORD_FIELD_COUNT,
                found: fields.len(),
            });
        }

        Ok(RawRecord {
            line_number: self.line_number,
            fields,
        })
    }
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Split one line into trimmed fields.
pub fn split_fields(line: &str, delimiter: Delimiter) -> Result<Vec<String>, RecordError> {
    match delimiter {
        Delimiter::Whitespace => Ok(line.split_whitespace().map(str::to_string).collect()),
        Delimiter::Tab => Ok(line.split('\t').map(|f| f.trim().to_string()).collect()),
        Delimiter::Comma => split_csv(line),
    }
}

fn split_csv(line: &str) -> Result<Vec<String>, RecordError> {
    if line.bytes().filter(|&b| b == b'"').count() % 2 == 1 {
        return Err(RecordError::Malformed("unterminated quoted field".to_string()));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(line.as_bytes());

    match reader.records().next() {
        Some(Ok(record)) => Ok(record.iter().map(str::to_string).collect()),
        Some(Err(e)) => Err(RecordError::Malformed(e.to_string())),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hint(file_name: Option<&str>, content_type: Option<&str>) -> UploadHint {
        UploadHint::new(file_name.map(String::from), content_type.map(String::from))
    }

    async fn decode_all(input: &str, hint: UploadHint, options: DecoderOptions) -> Vec<DecodedLine> {
        let mut decoder = RecordDecoder::open(input.as_bytes(), &hint, options)
            .await
            .unwrap();
        let mut lines = Vec::new();
        while let Some(line) = decoder.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_file_name_wins_over_content_type() {
        let h = hint(Some("clients.CSV"), Some("text/plain"));
        assert_eq!(h.resolve_delimiter("a b c"), Delimiter::Comma);
    }

    #[test]
    fn test_content_type_used_without_known_suffix() {
        let h = hint(Some("upload.bin"), Some("text/csv; charset=utf-8"));
        assert_eq!(h.resolve_delimiter("a b"), Delimiter::Comma);

        let h = hint(None, Some("text/tab-separated-values"));
        assert_eq!(h.resolve_delimiter("a b"), Delimiter::Tab);
    }

    #[test]
    fn test_plain_text_resolves_against_header() {
        let h = hint(Some("base.txt"), None);
        assert_eq!(h.resolve_delimiter("CPF\tPRIVATE"), Delimiter::Tab);
        assert_eq!(h.resolve_delimiter("CPF PRIVATE   INCOMPLETO"), Delimiter::Whitespace);
    }

    #[test]
    fn test_sniffing_when_nothing_declared() {
        let h = hint(None, Some("application/octet-stream"));
        assert_eq!(h.resolve_delimiter("a,b,c"), Delimiter::Comma);
        assert_eq!(h.resolve_delimiter("a\tb"), Delimiter::Tab);
        assert_eq!(h.resolve_delimiter("a b"), Delimiter::Whitespace);
    }

    #[test]
    fn test_split_csv_quotes() {
        let fields = split_fields(r#"a ,"b, c","say ""hi""""#, Delimiter::Comma).unwrap();
        assert_eq!(fields, vec!["a", "b, c", r#"say "hi""#]);
    }

    #[test]
    fn test_split_csv_unterminated_quote() {
        assert!(matches!(
            split_fields(r#"a,"b,c"#, Delimiter::Comma),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn test_split_whitespace_collapses_runs() {
        let fields = split_fields("a   b\t\tc ", Delimiter::Whitespace).unwrap();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_header_skipped_and_lines_numbered() {
        let input = "h1,h2,h3,h4,h5,h6,h7,h8\n1,2,3,4,5,6,7,8\r\n\n1,2,3\n";
        let lines = decode_all(input, hint(Some("a.csv"), None), DecoderOptions::default()).await;

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].line_number, 2);
        assert_eq!(lines[0].result.as_ref().unwrap().fields.len(), 8);
        assert_eq!(lines[1].line_number, 3);
        assert_eq!(
            lines[1].result,
            Err(RecordError::Incomplete { expected: 8, found: 0 })
        );
        assert_eq!(lines[2].line_number, 4);
        assert_eq!(
            lines[2].result,
            Err(RecordError::Incomplete { expected: 8, found: 3 })
        );
    }

    #[tokio::test]
    async fn test_empty_stream_and_header_only() {
        assert!(decode_all("", UploadHint::default(), DecoderOptions::default()).await.is_empty());
        assert!(decode_all("h1 h2\n", UploadHint::default(), DecoderOptions::default())
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_whitespace_only_line_is_incomplete_in_strict_mode() {
        let input = "a,b,c,d,e,f,g,h\n   \t \n";
        let strict = DecoderOptions { strict_csv: true };

        let lines = decode_all(input, hint(Some("a.csv"), None), strict).await;
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0].result,
            Err(RecordError::Incomplete { expected: 8, found: 0 })
        );
    }

    #[tokio::test]
    async fn test_bom_is_ignored_when_sniffing() {
        let input = "\u{feff}a,b,c,d,e,f,g,h\n1,2,3,4,5,6,7,8\n";
        let decoder = RecordDecoder::open(input.as_bytes(), &UploadHint::default(), DecoderOptions::default())
            .await
            .unwrap();
        assert_eq!(decoder.delimiter(), Delimiter::Comma);
    }

    #[tokio::test]
    async fn test_strict_csv_field_count() {
        let input = "a,b,c,d,e,f,g,h\n1,2,3,4,5,6,7,8,9\n1,2,3,4,5,6,7,8\n";
        let strict = DecoderOptions { strict_csv: true };

        let lines = decode_all(input, hint(Some("a.csv"), None), strict).await;
        assert!(matches!(lines[0].result, Err(RecordError::Malformed(_))));
        assert!(lines[1].result.is_ok());

        let lines = decode_all(input, hint(Some("a.csv"), None), DecoderOptions::default()).await;
        assert!(lines[0].result.is_ok());
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_malformed_line() {
        let mut input = b"a b c d e f g h\n".to_vec();
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        input.extend_from_slice(b"1 2 3 4 5 6 7 8\n");

        let mut decoder = RecordDecoder::open(&input[..], &UploadHint::default(), DecoderOptions::default())
            .await
            .unwrap();
        let first = decoder.next_line().await.unwrap().unwrap();
        assert!(matches!(first.result, Err(RecordError::Malformed(_))));
        let second = decoder.next_line().await.unwrap().unwrap();
        assert!(second.result.is_ok());
        assert!(decoder.next_line().await.unwrap().is_none());
    }
}
