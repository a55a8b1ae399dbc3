//! Static captures of rendered maps through a headless browser.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{anyhow, bail, Context, Result};
use tracing::{debug, info};
use url::Url;

const STATIC_CSS: &str = r#"<style>
.leaflet-container { pointer-events: none !important; }
.leaflet-control-zoom, .leaflet-control-attribution, .leaflet-control-layers { display: none !important; }
</style>
"#;

/// Milliseconds of virtual time the browser waits for tiles before capturing
const VIRTUAL_TIME_BUDGET: u32 = 2000;

/// Output files for one map capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub html: PathBuf,
    pub static_html: PathBuf,
    pub png: PathBuf,
    pub pdf: PathBuf,
}

impl SnapshotPaths {
    /// Paths for `<dir>/<stem>.html` and its static, PNG and PDF siblings
    pub fn for_stem(dir: &Path, stem: &str) -> Self {
        Self {
            html: dir.join(format!("{stem}.html")),
            static_html: dir.join(format!("{stem}_static.html")),
            png: dir.join(format!("{stem}.png")),
            pdf: dir.join(format!("{stem}.pdf")),
        }
    }
}

/// Non-interactive copy of a map page.
///
/// Returns the input unchanged if it has no `</head>`.
pub fn static_variant(html: &str) -> String {
    match html.find("</head>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + STATIC_CSS.len());
            out.push_str(&html[..pos]);
            out.push_str(STATIC_CSS);
            out.push_str(&html[pos..]);
            out
        }
        None => html.to_string(),
    }
}

/// Write the static page and capture it as PNG and PDF.
///
/// `window` is (width, height) in pixels.
pub fn capture(browser: &str, paths: &SnapshotPaths, window: (u32, u32)) -> Result<()> {
    let html = fs::read_to_string(&paths.html)
        .with_context(|| format!("Failed to read {}", paths.html.display()))?;
    fs::write(&paths.static_html, static_variant(&html))
        .with_context(|| format!("Failed to write {}", paths.static_html.display()))?;

    let absolute = fs::canonicalize(&paths.static_html)
        .with_context(|| format!("Failed to resolve {}", paths.static_html.display()))?;
    let page = Url::from_file_path(&absolute)
        .map_err(|_| anyhow!("Cannot build a file URL for {}", absolute.display()))?;

    run_browser(browser, window, &format!("--screenshot={}", paths.png.display()), &page)?;
    run_browser(browser, window, &format!("--print-to-pdf={}", paths.pdf.display()), &page)?;

    info!(
        "Captured {} and {}",
        paths.png.display(),
        paths.pdf.display()
    );
    Ok(())
}

fn browser_args(window: (u32, u32), output_flag: &str, page: &Url) -> Vec<String> {
    vec![
        "--headless".to_string(),
        "--disable-gpu".to_string(),
        format!("--window-size={},{}", window.0, window.1),
        format!("--virtual-time-budget={VIRTUAL_TIME_BUDGET}"),
        output_flag.to_string(),
        page.to_string(),
    ]
}

fn run_browser(browser: &str, window: (u32, u32), output_flag: &str, page: &Url) -> Result<()> {
    let args = browser_args(window, output_flag, page);
    debug!("Running {} {}", browser, args.join(" "));

    let output = Command::new(browser)
        .args(&args)
        .output()
        .with_context(|| format!("Failed to launch {}", browser))?;

    if !output.status.success() {
        bail!(
            "{} exited with {}: {}",
            browser,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_variant_injects_before_head_close() {
        let html = "<html><head><title>t</title></head><body></body></html>";
        let out = static_variant(html);
        let css = out.find("pointer-events: none").unwrap();
        assert!(css < out.find("</head>").unwrap());
        assert!(out.contains(".leaflet-control-layers"));
        assert!(out.ends_with("</head><body></body></html>"));
    }

    #[test]
    fn test_static_variant_without_head() {
        assert_eq!(static_variant("<p>x</p>"), "<p>x</p>");
    }

    #[test]
    fn test_paths_for_stem() {
        let paths = SnapshotPaths::for_stem(Path::new("data"), "wtd_map");
        assert_eq!(paths.html, Path::new("data/wtd_map.html"));
        assert_eq!(paths.static_html, Path::new("data/wtd_map_static.html"));
        assert_eq!(paths.png, Path::new("data/wtd_map.png"));
        assert_eq!(paths.pdf, Path::new("data/wtd_map.pdf"));
    }

    #[test]
    fn test_browser_args() {
        let page = Url::parse("file:///tmp/wtd_map_static.html").unwrap();
        let args = browser_args((729, 943), "--screenshot=/tmp/wtd_map.png", &page);
        assert_eq!(
            args,
            vec![
                "--headless",
                "--disable-gpu",
                "--window-size=729,943",
                "--virtual-time-budget=2000",
                "--screenshot=/tmp/wtd_map.png",
                "file:///tmp/wtd_map_static.html",
            ]
        );
    }

    #[test]
    fn test_missing_browser_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = SnapshotPaths::for_stem(dir.path(), "isp_map");
        fs::write(&paths.html, "<html><head></head><body></body></html>").unwrap();

        let result = capture("definitely-not-a-browser-binary", &paths, (100, 100));
        assert!(result.is_err());
        assert!(paths.static_html.exists());
        assert!(!paths.png.exists());
    }
}
