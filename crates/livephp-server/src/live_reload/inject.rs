//! Live-reload client injection into HTML payloads.

/// Client bootstrap script served at `/livereload.js`.
pub(crate) const CLIENT_SCRIPT: &str = r"
(function() {
  var es = new EventSource('/events');
  es.onmessage = function(event) {
    if (event.data === 'reload') {
      console.log('[livereload] Change detected, reloading...');
      window.location.reload();
    }
  };
})();
";

/// Snippet spliced into every HTML response.
pub(crate) const CLIENT_SNIPPET: &str = r"
<script>
(function() {
  try {
    var es = new EventSource('/events');
    es.onmessage = function(event) {
      if (event.data === 'reload') {
        console.log('[livereload] Change detected, reloading...');
        window.location.reload();
      }
    };
  } catch (e) {
    console.warn('[livereload] SSE not available', e);
  }
})();
</script>
";

const BODY_CLOSE: &[u8] = b"</body>";

/// Insert [`CLIENT_SNIPPET`] before the last `</body>` (any case), or append
/// it when there is none.
///
/// Not idempotent: injecting twice yields two copies. Each response path
/// calls this at most once.
pub(crate) fn inject(html: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(html.len() + CLIENT_SNIPPET.len());

    match rfind_ignore_case(html, BODY_CLOSE) {
        Some(idx) => {
            out.extend_from_slice(&html[..idx]);
            out.extend_from_slice(CLIENT_SNIPPET.as_bytes());
            out.extend_from_slice(&html[idx..]);
        }
        None => {
            out.extend_from_slice(html);
            out.extend_from_slice(CLIENT_SNIPPET.as_bytes());
        }
    }

    out
}

fn rfind_ignore_case(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window.eq_ignore_ascii_case(needle))
}
