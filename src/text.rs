#![forbid(unsafe_code)]

use std::io::{BufRead, Write};

use log::*;

use crate::codec::{check_width, unquote_hex, unquote_string};
use crate::error::{Error, Result};
use crate::footer::GzipFooter;
use crate::header::GzipHeader;
use crate::line_reader::{Line, LineReader};
use crate::schema::{
    lookup, FieldKind, FieldSpec, FieldValue, FooterField, HeaderField, FOOTER_FIELDS,
    HEADER_FIELDS,
};

////////////////////////////////////////////////////////////////////////////////

pub const SECTION_DELIMITER: &str = "----";

struct Note {
    title: &'static str,
    lines: &'static [&'static str],
}

/// Help text printed above the first field of each group.
fn header_note(field: HeaderField) -> Option<Note> {
    let note = |title: &'static str, lines: &'static [&'static str]| Some(Note { title, lines });
    match field {
        HeaderField::Id1 => note(
            "Identification Bytes",
            &[
                "Magic bytes of the gzip format (31 139).",
                "Changing them makes the result unrecognizable as gzip.",
            ],
        ),
        HeaderField::Cm => note(
            "Compression Method",
            &["8 (deflate) is the only method defined. 0-7 are reserved."],
        ),
        HeaderField::FText => note(
            "Text Flag",
            &["1 if the compressed data is probably ASCII text."],
        ),
        HeaderField::FHcrc => note(
            "Header CRC Flag",
            &["1 if a CRC-16 of the header precedes the compressed data."],
        ),
        HeaderField::FExtra => note(
            "Extra Field Flag",
            &["1 if the header carries an extra field."],
        ),
        HeaderField::FName => note(
            "Name Flag",
            &["1 if the header carries the original file name."],
        ),
        HeaderField::FComment => note(
            "Comment Flag",
            &["1 if the header carries a comment."],
        ),
        HeaderField::MTime => note(
            "Modification Time",
            &[
                "Seconds since the Epoch, 0 if unknown.",
                "The field is 32 bits wide, so at most 4294967295.",
            ],
        ),
        HeaderField::Xfl => note(
            "Extra Flags",
            &[
                "Meaning depends on the compression method. For deflate:",
                "",
                "  2: slowest algorithm, maximum compression",
                "  4: fastest algorithm",
            ],
        ),
        HeaderField::Os => note(
            "Operating System",
            &[
                "File system the data was compressed on:",
                "",
                "    0 - FAT filesystem (MS-DOS, OS/2, NT/Win32)",
                "    1 - Amiga",
                "    2 - VMS (or OpenVMS)",
                "    3 - Unix",
                "    4 - VM/CMS",
                "    5 - Atari TOS",
                "    6 - HPFS filesystem (OS/2, NT)",
                "    7 - Macintosh",
                "    8 - Z-System",
                "    9 - CP/M",
                "   10 - TOPS-20",
                "   11 - NTFS filesystem (NT)",
                "   12 - QDOS",
                "   13 - Acorn RISCOS",
                "  255 - unknown",
            ],
        ),
        HeaderField::ExtSi1 => note(
            "Extra Field (requires fextra = 1)",
            &[
                "Subfield ids and subfield data as quoted hex bytes,",
                "e.g. extdata = \"1a 2b\". A single subfield is supported.",
            ],
        ),
        HeaderField::Name => note(
            "Name Field (requires fname = 1)",
            &["Original file name, Latin-1 characters only."],
        ),
        HeaderField::Comment => note(
            "Comment Field (requires fcomment = 1)",
            &["Free-form comment, Latin-1 characters only."],
        ),
        HeaderField::Crc16 => note(
            "Header CRC-16 (requires fhcrc = 1)",
            &[
                "Low 16 bits of the CRC-32 of the header bytes before it.",
                "Leave empty to have it computed.",
            ],
        ),
        HeaderField::Id2 | HeaderField::ExtSi2 | HeaderField::ExtData => None,
    }
}

fn footer_note(field: FooterField) -> Note {
    match field {
        FooterField::Crc32 => Note {
            title: "CRC-32",
            lines: &["CRC-32 of the uncompressed data."],
        },
        FooterField::ISize => Note {
            title: "Input Size",
            lines: &["Size of the uncompressed data modulo 2^32."],
        },
    }
}

fn write_note<W: Write>(output: &mut W, note: &Note) -> Result<()> {
    writeln!(output, "### {}", note.title)?;
    for line in note.lines {
        if line.is_empty() {
            writeln!(output, "#")?;
        } else {
            writeln!(output, "# {}", line)?;
        }
    }
    writeln!(output)?;
    Ok(())
}

fn write_field<W: Write>(output: &mut W, key: &str, value: Option<FieldValue>) -> Result<()> {
    match value {
        Some(value) => writeln!(output, "{} = {}", key, value)?,
        None => writeln!(output, "{} =", key)?,
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////

pub fn write_text_header<W: Write>(output: &mut W, header: &GzipHeader) -> Result<()> {
    for (i, spec) in HEADER_FIELDS.iter().enumerate() {
        if let Some(note) = header_note(spec.field) {
            if i != 0 {
                writeln!(output)?;
            }
            write_note(output, &note)?;
        }
        write_field(output, spec.key, header.get(spec.field))?;
    }
    Ok(())
}

pub fn write_text_footer<W: Write>(output: &mut W, footer: &GzipFooter) -> Result<()> {
    for spec in FOOTER_FIELDS.iter() {
        writeln!(output)?;
        write_note(output, &footer_note(spec.field))?;
        write_field(output, spec.key, Some(footer.get(spec.field)))?;
    }
    Ok(())
}

////////////////////////////////////////////////////////////////////////////////

fn split_assignment(line: &Line) -> Result<(&str, &str)> {
    let (key, value) = line
        .text
        .split_once('=')
        .ok_or_else(|| Error::malformed(line.number, "expected `key = value`"))?;
    Ok((key.trim(), value.trim()))
}

fn parse_value<F>(spec: &FieldSpec<F>, literal: &str, line: usize) -> Result<FieldValue> {
    let malformed = |reason: String| Error::malformed(line, format!("`{}`: {}", spec.key, reason));

    match spec.kind {
        FieldKind::Flag(_) | FieldKind::Uint(_) => {
            let value: u64 = literal
                .parse()
                .map_err(|_| malformed(format!("`{}` is not a decimal integer", literal)))?;
            let bits = match spec.kind {
                FieldKind::Uint(width) => width.bits(),
                _ => 1,
            };
            let value = check_width(bits, value).map_err(|source| Error::Range {
                field: spec.key,
                source,
            })?;
            Ok(FieldValue::Uint(value))
        }
        FieldKind::Latin1 { .. } => unquote_string(literal)
            .map(FieldValue::Text)
            .map_err(|err| malformed(err.to_string())),
        FieldKind::Bytes { .. } => unquote_hex(literal)
            .map(FieldValue::Bytes)
            .map_err(|err| malformed(err.to_string())),
    }
}

/// Parses one `key = value` line against `table`. `None` for an empty value.
fn parse_assignment<F: Copy>(
    table: &'static [FieldSpec<F>],
    line: &Line,
) -> Result<Option<(F, FieldValue)>> {
    let (key, literal) = split_assignment(line)?;
    let spec = lookup(table, key).ok_or_else(|| Error::UnknownField {
        line: line.number,
        field: key.to_owned(),
    })?;
    if literal.is_empty() {
        return Ok(None);
    }
    let value = parse_value(spec, literal, line.number)?;
    debug!("line {}: {} = {}", line.number, spec.key, value);
    Ok(Some((spec.field, value)))
}

/// Reads the header section up to and including its delimiter line.
pub fn read_text_header<R: BufRead>(lines: &mut LineReader<R>) -> Result<GzipHeader> {
    let mut header = GzipHeader::default();
    loop {
        let line = lines
            .next_line()?
            .ok_or(Error::TruncatedInput("header section"))?;
        if line.is_section_end() {
            break;
        }
        if line.is_ignorable() {
            continue;
        }
        if let Some((field, value)) = parse_assignment(&HEADER_FIELDS, &line)? {
            header.set(field, value);
        }
    }
    Ok(header)
}

/// Reads the footer section until end of input. Keys left out stay zero.
pub fn read_text_footer<R: BufRead>(lines: &mut LineReader<R>) -> Result<GzipFooter> {
    let mut footer = GzipFooter::default();
    while let Some(line) = lines.next_line()? {
        if line.is_ignorable() {
            continue;
        }
        if let Some((field, value)) = parse_assignment(&FOOTER_FIELDS, &line)? {
            footer.set(field, value);
        }
    }
    Ok(footer)
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::header::{FEXTRA_OFFSET, FHCRC_OFFSET, FNAME_OFFSET};

    fn read_header(text: &str) -> Result<GzipHeader> {
        read_text_header(&mut LineReader::new(text.as_bytes()))
    }

    fn render(header: &GzipHeader) -> Result<String> {
        let mut output: Vec<u8> = vec![];
        write_text_header(&mut output, header)?;
        writeln!(output, "{}", SECTION_DELIMITER)?;
        Ok(String::from_utf8(output).unwrap())
    }

    #[test]
    fn minimal_header() -> Result<()> {
        let header = read_header("cm = 8\nname =\n----\n")?;
        assert_eq!(header, GzipHeader::default());
        Ok(())
    }

    #[test]
    fn comments_and_whitespace() -> Result<()> {
        let text = "# leading comment\n\n   \t\n  fname=1  \n#name = \"x\"\nname   =   \"a b\"  \n--\n";
        let header = read_header(text)?;
        assert!(header.flags.has_name());
        assert_eq!(header.name.as_deref(), Some("a b"));
        header.validate()?;
        Ok(())
    }

    #[test]
    fn delimiter_stops_reading() -> Result<()> {
        let mut lines = LineReader::new("os = 3\n----\nnot a header line\n".as_bytes());
        let header = read_text_header(&mut lines)?;
        assert_eq!(header.os, 3);
        assert_eq!(lines.next_line()?.unwrap().text, "not a header line");
        Ok(())
    }

    #[test]
    fn all_fields() -> Result<()> {
        let text = "\
id1 = 31
id2 = 139
cm = 8
ftext = 1
fhcrc = 1
fextra = 1
fname = 1
fcomment = 1
mtime = 4294967295
xfl = 2
os = 3
extsi1 = 65
extsi2 = 80
extdata = \"de ad be ef\"
name = \"caf\u{e9}.txt\"
comment = \"say \\\"hi\\\"\"
crc16 = 65535
----
";
        let header = read_header(text)?;
        assert!(header.flags.is_text());
        assert_eq!(header.modification_time, u32::MAX);
        assert_eq!(header.extra_subfield_id1, Some(65));
        assert_eq!(header.extra_data, Some(vec![0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(header.name.as_deref(), Some("caf\u{e9}.txt"));
        assert_eq!(header.comment.as_deref(), Some("say \"hi\""));
        assert_eq!(header.header_crc16, Some(0xffff));
        header.validate()?;
        Ok(())
    }

    #[test]
    fn errors_name_the_line() {
        assert!(matches!(
            read_header("os = 3\nbogus = 1\n----\n"),
            Err(Error::UnknownField { line: 2, ref field }) if field == "bogus"
        ));
        assert!(matches!(
            read_header("\nmtime\n----\n"),
            Err(Error::MalformedText { line: 2, .. })
        ));
        assert!(matches!(
            read_header("mtime = soon\n----\n"),
            Err(Error::MalformedText { line: 1, .. })
        ));
        assert!(matches!(
            read_header("name = hello\n----\n"),
            Err(Error::MalformedText { line: 1, .. })
        ));
        assert!(matches!(
            read_header("extdata = \"0g\"\n----\n"),
            Err(Error::MalformedText { line: 1, .. })
        ));
        assert!(matches!(
            read_header("crc32 = 1\n----\n"),
            Err(Error::UnknownField { line: 1, .. })
        ));
    }

    #[test]
    fn out_of_range_values() {
        assert!(matches!(
            read_header("os = 256\n----\n"),
            Err(Error::Range { field: "os", .. })
        ));
        assert!(matches!(
            read_header("mtime = 4294967296\n----\n"),
            Err(Error::Range { field: "mtime", .. })
        ));
        assert!(matches!(
            read_header("fname = 2\n----\n"),
            Err(Error::Range { field: "fname", .. })
        ));
    }

    #[test]
    fn missing_delimiter() {
        assert!(matches!(
            read_header("os = 3\n"),
            Err(Error::TruncatedInput("header section"))
        ));
    }

    #[test]
    fn coupling_is_left_to_validation() -> Result<()> {
        let header = read_header("fextra = 1\nextsi1 = 1\nextsi2 = 2\n----\n")?;
        assert_eq!(
            header.validate(),
            Err(ValidationError::MissingField {
                field: "extdata",
                flag: "fextra"
            })
        );

        let header = read_header("comment = \"orphan\"\n----\n")?;
        assert_eq!(
            header.validate(),
            Err(ValidationError::UnexpectedField {
                field: "comment",
                flag: "fcomment"
            })
        );
        Ok(())
    }

    #[test]
    fn written_header_reads_back() -> Result<()> {
        let mut header = GzipHeader {
            modification_time: 1234,
            extra_subfield_id1: Some(1),
            extra_subfield_id2: Some(2),
            extra_data: Some(vec![]),
            name: Some("hello.txt".to_owned()),
            ..Default::default()
        };
        for offset in [FEXTRA_OFFSET, FNAME_OFFSET, FHCRC_OFFSET] {
            header.flags.set_bit(offset, true);
        }

        let text = render(&header)?;
        assert!(text.contains("\nname = \"hello.txt\"\n"));
        assert!(text.contains("\nextdata = \"\"\n"));
        assert!(text.contains("\ncomment =\n"));
        assert!(text.contains("\ncrc16 =\n"));
        assert!(text.starts_with("### Identification Bytes\n"));

        let parsed = read_header(&text)?;
        assert_eq!(parsed, header);
        assert_eq!(render(&parsed)?, text);
        Ok(())
    }

    #[test]
    fn every_key_is_written() -> Result<()> {
        let text = render(&GzipHeader::default())?;
        for spec in HEADER_FIELDS.iter() {
            let line = text
                .lines()
                .find(|line| line.split('=').next().map(str::trim) == Some(spec.key));
            assert!(line.is_some(), "missing {}", spec.key);
        }
        Ok(())
    }

    #[test]
    fn footer() -> Result<()> {
        let footer = GzipFooter {
            data_crc32: 3_000_000_000,
            data_size: 42,
        };
        let mut output: Vec<u8> = vec![];
        write_text_footer(&mut output, &footer)?;
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("\ncrc32 = 3000000000\n"));
        assert!(text.contains("\nisize = 42\n"));

        let mut lines = LineReader::new(text.as_bytes());
        assert_eq!(read_text_footer(&mut lines)?, footer);

        let mut lines = LineReader::new("isize = 7\n".as_bytes());
        assert_eq!(
            read_text_footer(&mut lines)?,
            GzipFooter {
                data_crc32: 0,
                data_size: 7
            }
        );

        let mut lines = LineReader::new("name = \"x\"\n".as_bytes());
        assert!(matches!(
            read_text_footer(&mut lines),
            Err(Error::UnknownField { line: 1, .. })
        ));
        Ok(())
    }
}
