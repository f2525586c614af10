use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};

use super::paginate::{Page, PageSize};
use crate::error::ExportError;

const PRODUCER: &str = concat!("cornell ", env!("CARGO_PKG_VERSION"));

/// Build a PDF with one page per band. Each page draws its JPEG at full page
/// width, anchored to the top edge.
pub fn assemble_pdf(pages: &[Page], size: PageSize, title: &str) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(pages.len());
    for (index, page) in pages.iter().enumerate() {
        kids.push(Object::Reference(add_page(&mut doc, pages_id, index, page, size)?));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => text_string(title),
        "Producer" => Object::string_literal(PRODUCER),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| ExportError::Assemble(e.to_string()))?;
    Ok(out)
}

fn add_page(
    doc: &mut Document,
    parent: ObjectId,
    index: usize,
    page: &Page,
    size: PageSize,
) -> Result<ObjectId, ExportError> {
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(page.pixel_width),
            "Height" => i64::from(page.pixel_height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8i64,
            "Filter" => "DCTDecode",
        },
        page.jpeg.clone(),
    ));

    let name = format!("Im{index}");
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    page.width_pt.into(),
                    0i64.into(),
                    0i64.into(),
                    page.height_pt.into(),
                    0i64.into(),
                    (size.height_pt - page.height_pt).into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(name.clone().into_bytes())]),
            Operation::new("Q", vec![]),
        ],
    };
    let encoded = content
        .encode()
        .map_err(|e| ExportError::Assemble(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "MediaBox" => vec![
            0i64.into(),
            0i64.into(),
            size.width_pt.into(),
            size.height_pt.into(),
        ],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! {
                name.as_str() => image_id,
            },
        },
    }))
}

/// PDF text string: literal when ASCII, UTF-16BE with BOM otherwise
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::paginate::{encode_pages, plan_bands};
    use image::{Rgba, RgbaImage};

    fn pages_for(height: u32) -> Vec<Page> {
        let bitmap = RgbaImage::from_pixel(1600, height, Rgba([255, 255, 255, 255]));
        let bands = plan_bands(1600, height, PageSize::A4);
        encode_pages(&bitmap, &bands, PageSize::A4, 85).unwrap()
    }

    #[test]
    fn test_page_count_matches_bands() {
        let pdf = assemble_pdf(&pages_for(5657), PageSize::A4, "Algebra").unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[test]
    fn test_single_page_and_unicode_title() {
        let pdf = assemble_pdf(&pages_for(400), PageSize::A4, "Épreuve").unwrap();
        let doc = Document::load_mem(&pdf).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_text_string_encoding() {
        match text_string("abc") {
            Object::String(bytes, StringFormat::Literal) => assert_eq!(bytes, b"abc".to_vec()),
            other => panic!("unexpected {other:?}"),
        }
        match text_string("é") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(bytes, vec![0xFE, 0xFF, 0x00, 0xE9])
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
