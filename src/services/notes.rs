use serde::{Deserialize, Serialize};
use url::Url;

/// A Xiaohongshu note as fed into the itinerary prompt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteContent {
    pub note_id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Pulls the note id out of a share link.
///
/// Short links (`xhslink.com/...`) use the last path segment; full links
/// need an `/explore/<id>` segment.
pub fn extract_note_id(link: &str) -> Option<String> {
    let trimmed = link.trim();
    let parsed = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("https://{}", trimmed)))
        .ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    if host.ends_with("xhslink.com") {
        return segments.last().map(|s| s.to_string());
    }
    if host.ends_with("xiaohongshu.com") {
        let idx = segments.iter().position(|s| *s == "explore")?;
        return segments.get(idx + 1).map(|s| s.to_string());
    }
    None
}

/// Reading note bodies needs an authenticated session with Xiaohongshu, so
/// only the id is real here and the text is a generic placeholder.
pub fn fetch_note(link: &str) -> Option<NoteContent> {
    let note_id = extract_note_id(link)?;
    Some(NoteContent {
        note_id,
        title: "旅行攻略".to_string(),
        content: "这是一篇关于旅行的笔记...".to_string(),
        images: Vec::new(),
        tags: Vec::new(),
    })
}

/// Joins every resolvable note into the block appended to the prompt.
pub fn collect_note_text(links: &[String]) -> String {
    links
        .iter()
        .filter_map(|link| fetch_note(link))
        .map(|note| format!("\n笔记：{}\n{}\n", note.title, note.content))
        .collect()
}
