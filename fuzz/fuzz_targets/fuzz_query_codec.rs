#![no_main]

use libfuzzer_sys::fuzz_target;
use urlstate_core::{LocationSnapshot, QueryParams};

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };

    // Parsing never panics and a rendered query re-parses to the same pairs.
    let params = QueryParams::parse(input);
    let rendered = params.to_query_string();
    assert_eq!(QueryParams::parse(&rendered), params);

    // Rendering a location with its own params is stable after one pass.
    let location = LocationSnapshot::parse(input);
    let once = location.render(&location.params());
    let again = LocationSnapshot::parse(&once);
    assert_eq!(again.render(&again.params()), once);
});
