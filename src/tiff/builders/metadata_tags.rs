//! GDAL metadata tag
//!
//! GDAL keeps free-form metadata as an XML document in tag 42112:
//! `<GDALMetadata><Item name="..." sample="0">value</Item>...</GDALMetadata>`.
//! Items with a `sample` attribute belong to one band.

use std::io::Cursor;

use log::debug;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::tiff::constants::tags;
use crate::tiff::errors::{TiffError, TiffResult};
use crate::tiff::ifd::IFD;
use crate::utils::tiff_utils::{self, ExternalData};

/// One `<Item>` of a GDAL metadata document
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataItem {
    pub name: String,
    /// Band index for per-band items
    pub sample: Option<usize>,
    pub value: String,
}

impl MetadataItem {
    pub fn dataset(name: &str, value: impl Into<String>) -> Self {
        MetadataItem { name: name.to_string(), sample: None, value: value.into() }
    }

    pub fn band(name: &str, sample: usize, value: impl Into<String>) -> Self {
        MetadataItem { name: name.to_string(), sample: Some(sample), value: value.into() }
    }
}

fn xml_error(e: impl std::fmt::Display) -> TiffError {
    TiffError::GenericError(format!("GDAL metadata XML error: {}", e))
}

/// Builds and parses GDAL metadata
pub struct MetadataBuilder;

impl MetadataBuilder {
    /// Serializes items into a GDAL metadata document
    pub fn to_xml(items: &[MetadataItem]) -> TiffResult<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer.write_event(Event::Start(BytesStart::new("GDALMetadata"))).map_err(xml_error)?;
        for item in items {
            let mut start = BytesStart::new("Item");
            start.push_attribute(("name", item.name.as_str()));
            let sample = item.sample.map(|s| s.to_string());
            if let Some(sample) = sample.as_deref() {
                start.push_attribute(("sample", sample));
            }

            writer.write_event(Event::Start(start)).map_err(xml_error)?;
            writer.write_event(Event::Text(BytesText::new(&item.value))).map_err(xml_error)?;
            writer.write_event(Event::End(BytesEnd::new("Item"))).map_err(xml_error)?;
        }
        writer.write_event(Event::End(BytesEnd::new("GDALMetadata"))).map_err(xml_error)?;

        String::from_utf8(writer.into_inner().into_inner()).map_err(xml_error)
    }

    /// Parses the items of a GDAL metadata document
    pub fn parse_xml(xml: &str) -> TiffResult<Vec<MetadataItem>> {
        let mut reader = Reader::from_str(xml);
        let mut items = Vec::new();
        let mut current: Option<MetadataItem> = None;

        loop {
            match reader.read_event().map_err(xml_error)? {
                Event::Start(start) if start.name().as_ref() == b"Item" => {
                    let mut item = MetadataItem { name: String::new(), sample: None, value: String::new() };
                    for attribute in start.attributes() {
                        let attribute = attribute.map_err(xml_error)?;
                        let value = String::from_utf8_lossy(&attribute.value).into_owned();
                        match attribute.key.as_ref() {
                            b"name" => item.name = value,
                            b"sample" => item.sample = value.parse().ok(),
                            _ => {}
                        }
                    }
                    current = Some(item);
                }
                Event::Text(text) => {
                    if let Some(item) = current.as_mut() {
                        let raw = String::from_utf8_lossy(&text).into_owned();
                        let unescaped = quick_xml::escape::unescape(&raw).map_err(xml_error)?;
                        item.value.push_str(&unescaped);
                    }
                }
                Event::End(end) if end.name().as_ref() == b"Item" => {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(items)
    }

    /// Writes items into the GDAL metadata tag
    pub fn set_gdal_metadata(
        ifd: &mut IFD,
        external_data: &mut ExternalData,
        ifd_index: usize,
        items: &[MetadataItem],
        is_big_tiff: bool
    ) -> TiffResult<()> {
        let xml = Self::to_xml(items)?;
        debug!("GDAL metadata: {} bytes, {} item(s)", xml.len(), items.len());
        tiff_utils::set_ascii_value(ifd, external_data, ifd_index, tags::GDAL_METADATA, &xml, is_big_tiff);
        Ok(())
    }
}
