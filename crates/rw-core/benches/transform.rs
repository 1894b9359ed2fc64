use criterion::{black_box, criterion_group, criterion_main, Criterion};

use rw_core::record::StoredState;
use rw_core::{rewrite_url, RuleSnapshot, Version};

const STATE: &str = r#"{
    "enabled": true,
    "rules": [
        {"id": 1, "domain": "example.com", "action": "remove", "enabled": true, "parameter": "utm_source"},
        {"id": 2, "domain": "example.com", "action": "remove", "enabled": true, "parameter": "utm_medium"},
        {"id": 3, "domain": "example.com", "action": "add", "enabled": true, "parameter": "lang", "value": "en"},
        {"id": 4, "domain": "example.com", "action": "redirect", "enabled": true, "fromPath": "/u/0", "toPath": "/u/2"},
        {"id": 5, "domain": "example.com", "action": "hideElement", "enabled": true, "selector": ".ad-banner"},
        {"id": 6, "domain": "other.org", "action": "remove", "enabled": true, "parameter": "ref"}
    ]
}"#;

fn bench_rewrite(c: &mut Criterion) {
    let state = StoredState::from_json(STATE).expect("bench state parses");
    let snapshot = RuleSnapshot::from_state(&state, Version::default());

    c.bench_function("rewrite_matching", |b| {
        b.iter(|| {
            rewrite_url(
                black_box(&snapshot.rules),
                black_box("https://www.example.com/u/0/inbox?utm_source=mail&utm_medium=x&id=42"),
            )
        })
    });

    c.bench_function("rewrite_no_match", |b| {
        b.iter(|| rewrite_url(black_box(&snapshot.rules), black_box("https://unrelated.net/path?q=1")))
    });

    c.bench_function("snapshot_from_state", |b| {
        b.iter(|| RuleSnapshot::from_state(black_box(&state), Version::default()))
    });
}

criterion_group!(benches, bench_rewrite);
criterion_main!(benches);
