use httpmock::{Method::GET, Mock, MockServer};
use std::{fs, path::PathBuf};

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

pub fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixtures_dir().join(name)).unwrap()
}

/// Serve `fixture` as JSON for any GET on `path`
pub fn serve_get<'a>(server: &'a MockServer, path: &str, fixture: &str) -> Mock<'a> {
    let body = read_fixture(fixture);
    server.mock(|when, then| {
        when.method(GET).path(path);
        then.status(200)
            .header("content-type", "application/json")
            .body(body);
    })
}
