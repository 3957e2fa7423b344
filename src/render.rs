//! Fixed HTML pages.

use crate::models::RemovalResponse;

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Background Remover</title>
<style>
body { font-family: sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
.flash { background: #fde2e2; color: #8a1c1c; padding: .75rem 1rem; border-radius: .25rem; }
.pair { display: flex; gap: 1rem; flex-wrap: wrap; }
.pair figure { flex: 1; margin: 0; }
.pair img { max-width: 100%; background: repeating-conic-gradient(#ddd 0 25%, #fff 0 50%) 0 0 / 16px 16px; }
</style>
</head>
<body>
<nav><a href="/">Remove a background</a> | <a href="/about">About</a></nav>
"#;

const FOOT: &str = "</body>\n</html>\n";

fn page(body: &str) -> String {
    format!("{}{}{}", HEAD, body, FOOT)
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn index(flash: Option<&str>) -> String {
    let flash = flash
        .map(|msg| format!("<p class=\"flash\">{}</p>\n", escape(msg)))
        .unwrap_or_default();
    page(&format!(
        r#"<h1>Remove an image background</h1>
{flash}<form action="/remove-bg" method="post" enctype="multipart/form-data">
<input type="file" name="image" accept=".png,.jpg,.jpeg,.webp,.bmp" required>
<button type="submit">Remove background</button>
</form>
<p>PNG, JPG, JPEG, WEBP or BMP, up to 16 MB.</p>
"#
    ))
}

pub fn result(view: &RemovalResponse) -> String {
    page(&format!(
        r#"<h1>Done</h1>
<div class="pair">
<figure><img src="{original}" alt="Original image"><figcaption>Original</figcaption></figure>
<figure><img src="{result}" alt="Image without background"><figcaption>Background removed</figcaption></figure>
</div>
<p><a href="{download}">Download PNG</a> | <a href="/">Process another image</a></p>
<p><small>Files are deleted after one hour.</small></p>
"#,
        original = escape(&view.original_image),
        result = escape(&view.result_image),
        download = escape(&view.download_url),
    ))
}

pub fn about() -> String {
    page(
        r#"<h1>About</h1>
<p>Upload a photo and get it back as a PNG with a transparent background.</p>
<p>Images are sent to a hosted background removal service. If that service is
unavailable the background is removed on this server instead.</p>
<p>Uploaded and processed images are kept for one hour and then deleted.</p>
"#,
    )
}
