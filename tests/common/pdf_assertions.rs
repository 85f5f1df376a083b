use lopdf::content::Content;
use lopdf::{Document as LopdfDocument, ObjectId};

/// `[x0, y0, x1, y1]` of a page's MediaBox, in points.
pub fn media_box(doc: &LopdfDocument, page_id: ObjectId) -> Vec<f32> {
    doc.get_dictionary(page_id)
        .and_then(|page| page.get(b"MediaBox"))
        .and_then(|mb| mb.as_array())
        .map(|values| values.iter().filter_map(|v| v.as_float().ok()).collect())
        .unwrap_or_default()
}

/// Pixel size of the poster image drawn on a page.
pub fn poster_image_size(doc: &LopdfDocument, page_id: ObjectId) -> Option<(i64, i64)> {
    let page = doc.get_dictionary(page_id).ok()?;
    let resources = page.get(b"Resources").ok()?.as_dict().ok()?;
    let xobjects = resources.get(b"XObject").ok()?.as_dict().ok()?;
    let image_id = xobjects.get(b"Poster").ok()?.as_reference().ok()?;
    let stream = doc.get_object(image_id).ok()?.as_stream().ok()?;
    let width = stream.dict.get(b"Width").ok()?.as_i64().ok()?;
    let height = stream.dict.get(b"Height").ok()?.as_i64().ok()?;
    Some((width, height))
}

/// Operands of the `cm` operator that positions the poster image.
pub fn placement_matrix(doc: &LopdfDocument, page_id: ObjectId) -> Vec<f32> {
    let Ok(bytes) = doc.get_page_content(page_id) else {
        return Vec::new();
    };
    let Ok(content) = Content::decode(&bytes) else {
        return Vec::new();
    };
    content
        .operations
        .iter()
        .find(|op| op.operator == "cm")
        .map(|op| op.operands.iter().filter_map(|o| o.as_float().ok()).collect())
        .unwrap_or_default()
}

/// Assert the number of pages in a PDF
#[macro_export]
macro_rules! assert_pdf_page_count {
    ($pdf:expr, $count:expr) => {
        assert_eq!(
            $pdf.page_count(),
            $count,
            "Expected {} pages, got {}",
            $count,
            $pdf.page_count()
        );
    };
}

/// Assert two lengths agree within a tolerance
#[macro_export]
macro_rules! assert_close {
    ($left:expr, $right:expr, $tol:expr) => {
        let (l, r) = ($left as f64, $right as f64);
        assert!((l - r).abs() <= $tol, "{} and {} differ by more than {}", l, r, $tol);
    };
}
