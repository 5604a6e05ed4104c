use crate::{
    error::{MagicError, Result},
    models::{ArkImageItem, ArkResponse},
};

/// First usable image in a response: `data[0]`, then `images[0]`.
///
/// A URL wins over inline base64; inline payloads come back as a JPEG data URL.
pub fn extract_image(response: &ArkResponse) -> Result<String> {
    [&response.data, &response.images]
        .into_iter()
        .filter_map(|list| list.as_ref().and_then(|items| items.first()))
        .find_map(image_reference)
        .ok_or(MagicError::NoImageReturned)
}

fn image_reference(item: &ArkImageItem) -> Option<String> {
    if let Some(url) = item.url.as_deref().filter(|u| !u.is_empty()) {
        return Some(url.to_string());
    }
    item.b64_json
        .as_deref()
        .filter(|b| !b.is_empty())
        .map(|b64| format!("data:image/jpeg;base64,{}", b64))
}
