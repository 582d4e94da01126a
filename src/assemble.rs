//! Builds the output PDF: one full-page JPEG image per page.

use std::io::Write;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::{CompressError, Result};
use crate::pipeline::{AssembledDocument, DocumentAssembler, EncodedPage};

const IMAGE_NAME: &[u8] = b"Im1";

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfAssembler;

impl LopdfAssembler {
    fn add_page(doc: &mut Document, pages_id: ObjectId, page: &EncodedPage) -> Result<ObjectId> {
        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => page.width as i64,
                "Height" => page.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            page.bytes.clone(),
        );
        let image_id = doc.add_object(image);

        let (w, h) = (page.page_width_pt, page.page_height_pt);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        Object::from(w),
                        Object::Integer(0),
                        Object::Integer(0),
                        Object::from(h),
                        Object::Integer(0),
                        Object::Integer(0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content.encode().map_err(|e| {
            CompressError::Assemble(format!("page {} content: {}", page.index + 1, e))
        })?;

        let mut deflater = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::best());
        deflater.write_all(&encoded)?;
        let compressed = deflater.finish()?;
        let content_id = doc.add_object(Stream::new(
            dictionary! { "Filter" => "FlateDecode" },
            compressed,
        ));

        let mut xobjects = lopdf::Dictionary::new();
        xobjects.set(IMAGE_NAME, Object::Reference(image_id));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::from(w),
                Object::from(h),
            ],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => xobjects,
            },
        });
        Ok(page_id)
    }
}

impl DocumentAssembler for LopdfAssembler {
    fn assemble(&self, pages: &[EncodedPage]) -> Result<AssembledDocument> {
        if pages.is_empty() {
            return Err(CompressError::Assemble("no pages to assemble".to_string()));
        }

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::with_capacity(pages.len());
        for page in pages {
            kids.push(Object::Reference(Self::add_page(&mut doc, pages_id, page)?));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Count" => pages.len() as i64,
                "Kids" => kids,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer)
            .map_err(|e| CompressError::Assemble(format!("failed to serialize PDF: {}", e)))?;

        Ok(AssembledDocument { bytes: buffer })
    }
}

/// Number of pages in a serialized PDF.
pub fn page_count(bytes: &[u8]) -> Result<usize> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| CompressError::Assemble(format!("output is not a readable PDF: {}", e)))?;
    Ok(doc.get_pages().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_page(index: usize, width: u32) -> EncodedPage {
        EncodedPage {
            index,
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            width,
            height: 10,
            page_width_pt: 612.0,
            page_height_pt: 792.0,
        }
    }

    fn image_stream(doc: &Document, page_id: ObjectId) -> &Stream {
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let image_id = xobjects.get(IMAGE_NAME).unwrap().as_reference().unwrap();
        doc.get_object(image_id).unwrap().as_stream().unwrap()
    }

    #[test]
    fn page_count_and_order_match_input() {
        let pages: Vec<_> = (0..5).map(|i| fake_page(i, 100 + i as u32)).collect();
        let assembled = LopdfAssembler.assemble(&pages).unwrap();

        assert!(assembled.bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(page_count(&assembled.bytes).unwrap(), 5);

        let doc = Document::load_mem(&assembled.bytes).unwrap();
        let widths: Vec<i64> = doc
            .get_pages()
            .values()
            .map(|id| {
                image_stream(&doc, *id)
                    .dict
                    .get(b"Width")
                    .unwrap()
                    .as_i64()
                    .unwrap()
            })
            .collect();
        assert_eq!(widths, vec![100, 101, 102, 103, 104]);
    }

    #[test]
    fn image_bytes_are_embedded_verbatim() {
        let page = fake_page(0, 8);
        let assembled = LopdfAssembler.assemble(std::slice::from_ref(&page)).unwrap();
        let doc = Document::load_mem(&assembled.bytes).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();

        assert_eq!(image_stream(&doc, page_id).content, page.bytes);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            LopdfAssembler.assemble(&[]),
            Err(CompressError::Assemble(_))
        ));
    }
}
