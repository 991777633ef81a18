//! Download link discovery.

use crate::{FetchError, Result};
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::Url;
use std::fs;
use std::path::Path;

/// `href` of an image-map `<area>` element.
const AREA_HREF: &str = r#"(?is)<area\b[^>]*?\bhref\s*=\s*["']([^"']+)["']"#;

/// Fetch a coverage page as text.
pub fn fetch_page(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send()?;
    if !response.status().is_success() {
        return Err(FetchError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }
    Ok(response.text()?)
}

/// Collect the `<area href>` links of a coverage page, resolved against `page_url`.
///
/// Duplicates are dropped; page order is kept.
pub fn harvest_area_links(html: &str, page_url: &str) -> Result<Vec<String>> {
    let base = parse_url(page_url)?;
    let pattern = Regex::new(AREA_HREF)?;

    let mut links: Vec<String> = Vec::new();
    for caps in pattern.captures_iter(html) {
        let Some(href) = caps.get(1) else {
            continue;
        };
        let href = href.as_str().trim().replace("&amp;", "&");
        let resolved = base
            .join(&href)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", href, e)))?
            .to_string();
        if !links.contains(&resolved) {
            links.push(resolved);
        }
    }

    if links.is_empty() {
        return Err(FetchError::NoLinks(page_url.to_string()));
    }
    Ok(links)
}

/// Read one URL per line, skipping blank lines and `#` comments.
pub fn read_url_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    let mut urls = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        parse_url(line)?;
        urls.push(line.to_string());
    }

    if urls.is_empty() {
        return Err(FetchError::NoLinks(path.display().to_string()));
    }
    Ok(urls)
}

/// Local name for the `index`-th link: `{index}-{last path segment}`.
pub fn link_file_name(index: usize, url: &str) -> String {
    let segment = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut s| s.next_back().map(str::to_string))
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "download".to_string());
    format!("{}-{}", index, segment)
}

fn parse_url(url: &str) -> Result<Url> {
    Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PAGE: &str = r#"
        <map name="srtm">
          <area shape="rect" coords="0,0,10,10" href="SRTM_Data/srtm_38_01.zip" alt="38_01">
          <AREA SHAPE="rect" HREF='https://mirror.example.org/srtm_39_01.zip?a=1&amp;b=2'>
          <area shape="rect" href="SRTM_Data/srtm_38_01.zip">
          <a href="not-an-area.zip">ignored</a>
        </map>"#;

    #[test]
    fn test_harvest_area_links() {
        let links = harvest_area_links(PAGE, "http://srtm.example.org/coverage/index.html").unwrap();
        assert_eq!(
            links,
            vec![
                "http://srtm.example.org/coverage/SRTM_Data/srtm_38_01.zip",
                "https://mirror.example.org/srtm_39_01.zip?a=1&b=2",
            ]
        );
    }

    #[test]
    fn test_no_links() {
        let err = harvest_area_links("<html></html>", "http://example.org/").unwrap_err();
        assert!(matches!(err, FetchError::NoLinks(_)));
    }

    #[test]
    fn test_bad_page_url() {
        let err = harvest_area_links(PAGE, "not a url").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }

    #[test]
    fn test_read_url_list() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# srtm tiles").unwrap();
        writeln!(file, "http://example.org/a.zip").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  http://example.org/b.zip  ").unwrap();

        let urls = read_url_list(file.path()).unwrap();
        assert_eq!(urls, vec!["http://example.org/a.zip", "http://example.org/b.zip"]);
    }

    #[test]
    fn test_link_file_name() {
        assert_eq!(link_file_name(3, "http://example.org/data/srtm_38_01.zip"), "3-srtm_38_01.zip");
        assert_eq!(link_file_name(0, "http://example.org/a.zip?token=x"), "0-a.zip");
        assert_eq!(link_file_name(7, "http://example.org/"), "7-download");
    }
}
