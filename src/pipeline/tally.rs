//! Ledger-import XML: records → Tally `ENVELOPE` document.
//!
//! The element nesting is the compatibility contract with the accounting
//! server and must not change:
//!
//! ```text
//! ENVELOPE
//! ├─ HEADER
//! │  └─ TALLYREQUEST      "Import Data"
//! └─ BODY
//!    └─ IMPORTDATA
//!       ├─ REQUESTDESC
//!       │  └─ REPORTNAME  "All Masters"
//!       └─ REQUESTDATA
//!          └─ TALLYMESSAGE (one per record)
//!             └─ LEDGER
//!                └─ <UPPERCASE FIELD NAME>  value
//! ```
//!
//! Indentation is cosmetic; only well-formedness and the nesting matter.

use crate::error::{Pdf2TallyError, Result};
use crate::record::{resolve_header, Record};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use regex::Regex;
use std::borrow::Cow;
use tracing::debug;

pub const TALLY_REQUEST: &str = "Import Data";
pub const REPORT_NAME: &str = "All Masters";

/// Characters that may not appear in an element name (after uppercasing).
static RE_INVALID_NAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}_.\-]").unwrap());

/// Element name for a record field: the uppercased field name.
///
/// Names that are not valid XML names have each offending character replaced
/// with `_`, and get a leading `_` if they would otherwise start with a digit,
/// `-` or `.`. Valid names are only uppercased.
pub fn ledger_tag(field_name: &str) -> String {
    let upper = field_name.trim().to_uppercase();
    let mut tag = RE_INVALID_NAME_CHARS.replace_all(&upper, "_").into_owned();
    let needs_prefix = match tag.chars().next() {
        None => true,
        Some(c) => !(c.is_alphabetic() || c == '_'),
    };
    if needs_prefix {
        tag.insert(0, '_');
    }
    tag
}

/// Element names for one record's fields, in field order.
///
/// Distinct field names can sanitise to the same tag (`Amount ($)` and
/// `Amount (₹)`); later duplicates get `_1`, `_2`, … so no value is lost
/// behind a repeated element.
pub fn ledger_tags<'a, I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let tags: Vec<String> = names.into_iter().map(ledger_tag).collect();
    resolve_header(&tags, tags.len())
}

/// Drop characters XML 1.0 cannot carry: C0 controls other than tab, LF and
/// CR, plus U+FFFE and U+FFFF.
fn xml_safe_text(text: &str) -> Cow<'_, str> {
    let illegal = |c: char| {
        (c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')) || matches!(c, '\u{FFFE}' | '\u{FFFF}')
    };
    if text.chars().any(illegal) {
        Cow::Owned(text.chars().filter(|&c| !illegal(c)).collect())
    } else {
        Cow::Borrowed(text)
    }
}

/// Build the full import document for `records`, in record order.
///
/// Zero records still produce the complete skeleton with an empty
/// `REQUESTDATA`.
pub fn build_envelope<I>(records: I) -> Result<String>
where
    I: IntoIterator<Item = Record>,
{
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let mut count = 0usize;

    write_envelope(&mut writer, records.into_iter().inspect(|_| count += 1))
        .map_err(|e| Pdf2TallyError::Internal(format!("XML writer failed: {e}")))?;

    let mut xml = String::from_utf8(writer.into_inner())
        .map_err(|e| Pdf2TallyError::Internal(format!("XML is not UTF-8: {e}")))?;
    xml.push('\n');

    debug!("Built envelope: {} ledger entries, {} bytes", count, xml.len());
    Ok(xml)
}

fn write_envelope<W, I>(w: &mut Writer<W>, records: I) -> quick_xml::Result<()>
where
    W: std::io::Write,
    I: Iterator<Item = Record>,
{
    w.write_event(Event::Decl(BytesDecl::new("1.0", None, None)))?;
    open(w, "ENVELOPE")?;

    open(w, "HEADER")?;
    leaf(w, "TALLYREQUEST", TALLY_REQUEST)?;
    close(w, "HEADER")?;

    open(w, "BODY")?;
    open(w, "IMPORTDATA")?;

    open(w, "REQUESTDESC")?;
    leaf(w, "REPORTNAME", REPORT_NAME)?;
    close(w, "REQUESTDESC")?;

    open(w, "REQUESTDATA")?;
    for record in records {
        open(w, "TALLYMESSAGE")?;
        open(w, "LEDGER")?;
        let tags = ledger_tags(record.names());
        for (tag, (_, value)) in tags.iter().zip(record.fields()) {
            leaf(w, tag, value)?;
        }
        close(w, "LEDGER")?;
        close(w, "TALLYMESSAGE")?;
    }
    close(w, "REQUESTDATA")?;

    close(w, "IMPORTDATA")?;
    close(w, "BODY")?;
    close(w, "ENVELOPE")
}

fn open<W: std::io::Write>(w: &mut Writer<W>, name: &str) -> quick_xml::Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))
}

fn close<W: std::io::Write>(w: &mut Writer<W>, name: &str) -> quick_xml::Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))
}

/// `<name>text</name>`, or `<name/>` for empty text. Text is escaped and
/// stripped of characters XML cannot represent.
fn leaf<W: std::io::Write>(w: &mut Writer<W>, name: &str, text: &str) -> quick_xml::Result<()> {
    let text = xml_safe_text(text);
    if text.is_empty() {
        return w.write_event(Event::Empty(BytesStart::new(name)));
    }
    open(w, name)?;
    w.write_event(Event::Text(BytesText::new(&text)))?;
    close(w, name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> Record {
        Record::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn tags_are_uppercased() {
        assert_eq!(ledger_tag("Name"), "NAME");
        assert_eq!(ledger_tag("opening_balance"), "OPENING_BALANCE");
        assert_eq!(ledger_tag("__EMPTY_1"), "__EMPTY_1");
    }

    #[test]
    fn invalid_tag_chars_replaced() {
        assert_eq!(ledger_tag("Opening Balance"), "OPENING_BALANCE");
        assert_eq!(ledger_tag("Amount (₹)"), "AMOUNT____");
        assert_eq!(ledger_tag("Débit"), "DÉBIT");
        assert_eq!(ledger_tag("2024"), "_2024");
        assert_eq!(ledger_tag(""), "_");
        assert_eq!(ledger_tag("a:b"), "A_B");
    }

    #[test]
    fn skeleton_nesting_and_values() {
        let xml = build_envelope(vec![
            record(&[("Name", "Widget"), ("Amount", "100")]),
            record(&[("Name", "Gadget"), ("Amount", "250")]),
        ])
        .unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\"?>"), "got: {xml}");
        assert!(xml.contains("<TALLYREQUEST>Import Data</TALLYREQUEST>"));
        assert!(xml.contains("<REPORTNAME>All Masters</REPORTNAME>"));
        assert_eq!(xml.matches("<TALLYMESSAGE>").count(), 2);
        assert_eq!(xml.matches("<LEDGER>").count(), 2);

        let widget = xml.find("<NAME>Widget</NAME>").unwrap();
        let widget_amount = xml.find("<AMOUNT>100</AMOUNT>").unwrap();
        let gadget = xml.find("<NAME>Gadget</NAME>").unwrap();
        assert!(widget < widget_amount && widget_amount < gadget);

        let header = xml.find("<HEADER>").unwrap();
        let body = xml.find("<BODY>").unwrap();
        let data = xml.find("<REQUESTDATA>").unwrap();
        assert!(header < body && body < data && data < widget);
    }

    #[test]
    fn values_are_escaped() {
        let xml = build_envelope(vec![record(&[("Party", "Smith & Sons <Ltd>")])]).unwrap();
        assert!(
            xml.contains("<PARTY>Smith &amp; Sons &lt;Ltd&gt;</PARTY>"),
            "got: {xml}"
        );
    }

    #[test]
    fn empty_value_is_empty_element() {
        let xml = build_envelope(vec![record(&[("Name", "X"), ("Memo", "")])]).unwrap();
        assert!(xml.contains("<MEMO/>"), "got: {xml}");
    }

    #[test]
    fn colliding_tags_get_suffixes() {
        assert_eq!(
            ledger_tags(["Amount ($)", "Amount (₹)", "Name"]),
            vec!["AMOUNT____", "AMOUNT_____1", "NAME"]
        );

        let xml =
            build_envelope(vec![record(&[("Amount ($)", "10"), ("Amount (₹)", "800")])]).unwrap();
        assert!(xml.contains("<AMOUNT____>10</AMOUNT____>"), "got: {xml}");
        assert!(xml.contains("<AMOUNT_____1>800</AMOUNT_____1>"), "got: {xml}");
    }

    #[test]
    fn control_chars_are_dropped() {
        let xml = build_envelope(vec![record(&[
            ("Name", "A\u{2}B\u{c}"),
            ("Memo", "\u{1b}"),
            ("Note", "tab\there"),
        ])])
        .unwrap();
        assert!(xml.contains("<NAME>AB</NAME>"), "got: {xml}");
        assert!(xml.contains("<MEMO/>"), "got: {xml}");
        assert!(xml.contains("<NOTE>tab\there</NOTE>"), "got: {xml}");
        assert!(
            !xml.chars().any(|c| c < '\u{20}' && !matches!(c, '\t' | '\n' | '\r')),
            "got: {xml:?}"
        );
    }

    #[test]
    fn zero_records_keeps_skeleton() {
        let xml = build_envelope(Vec::new()).unwrap();
        assert!(xml.contains("<ENVELOPE>"));
        assert!(xml.contains("</ENVELOPE>"));
        assert!(!xml.contains("<TALLYMESSAGE>"));
    }
}
