//! XML parsing utilities for SpreadsheetML parts
//! Provides an XML reader wrapper and helper traits for attribute and text processing

use crate::spreadsheet::SpreadsheetError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::borrow::Cow;
use std::str::FromStr;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute value '{0}' failed")]
    ParseAttributeValueError(String),
}

/// XML reader over a fully loaded part, configured for spreadsheet parsing.
/// Events borrow from the part text, not from the reader.
pub(crate) struct XmlReader<'a> {
    reader: Reader<&'a [u8]>,
}

impl<'a> XmlReader<'a> {
    /// Creates a new XML reader with the configuration spreadsheet parts need
    pub(crate) fn new(xml: &'a str) -> XmlReader<'a> {
        let mut reader = Reader::from_str(xml);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = true;
        config.trim_text(false);
        XmlReader { reader }
    }

    /// Reads the next XML event, `None` at end of input
    pub(crate) fn next(&mut self) -> Result<Option<Event<'a>>, SpreadsheetError> {
        match self.reader.read_event()? {
            Event::Eof => Ok(None),
            event => Ok(Some(event)),
        }
    }
}

/// Helper trait for XML attributes providing convenient value extraction and parsing
pub(crate) trait XmlAttributeHelper<'a> {
    /// Gets the unescaped attribute value as a string
    fn get_value(&self) -> Result<Cow<'a, str>, SpreadsheetError>;

    /// Parses the attribute value to the specified type
    fn parse_value<T: FromStr>(&self) -> Result<T, SpreadsheetError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, SpreadsheetError> {
        Ok(self.unescape_value()?)
    }

    fn parse_value<T: FromStr>(&self) -> Result<T, SpreadsheetError> {
        let value = self.get_value()?;
        value
            .parse()
            .map_err(|_| XmlError::ParseAttributeValueError(value.to_string()).into())
    }
}

/// Helper trait for XML nodes providing attribute access methods
pub(crate) trait XmlNodeHelper {
    /// Gets an attribute value by qualified name
    fn get_attribute_value(&self, name: &str) -> Result<Option<String>, SpreadsheetError>;

    /// Gets an attribute value by local name, ignoring any namespace prefix
    fn get_local_attribute_value(&self, name: &str) -> Result<Option<String>, SpreadsheetError>;

    /// Parses an attribute value to the specified type
    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, SpreadsheetError>;
}

impl XmlNodeHelper for BytesStart<'_> {
    fn get_attribute_value(&self, name: &str) -> Result<Option<String>, SpreadsheetError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value().map(Cow::into_owned))
            .transpose()
    }

    fn get_local_attribute_value(&self, name: &str) -> Result<Option<String>, SpreadsheetError> {
        for result in self.attributes() {
            let attribute = result?;
            if attribute.key.local_name().as_ref() == name.as_bytes() {
                return Ok(Some(attribute.get_value()?.into_owned()));
            }
        }
        Ok(None)
    }

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, SpreadsheetError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.parse_value())
            .transpose()
    }
}

/// Helper trait for building text content from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends text content from BytesRef event (handles entities and character references)
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), SpreadsheetError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), SpreadsheetError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)
            } else {
                number.parse::<u32>()
            }
            .map_err(|_| XmlError::ParseEntityError(raw.to_string()))?;
            if let Some(character) = std::char::from_u32(code) {
                self.push(character);
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }

        Ok(())
    }
}

#[macro_export]
#[doc(hidden)]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(event) = $reader.next()? {
            match event {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}
