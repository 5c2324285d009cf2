//! Benchmarks for the render pass.
//!
//! Run with: cargo bench

use std::fmt::Write;

use criterion::{Criterion, criterion_group, criterion_main};

use csspipe::css::StyleSheet;
use csspipe::expr::Template;
use csspipe::{Engine, ModeRegistry, RenderOptions};

const STYLE: &str = r#"
    .row { --body: (<span class="cell">${el.dataset.n}</span><span class="sq"></span>) }
    .sq { --script: (el.textContent = el.parentElement.dataset.n ** 2) }
    .table {
        --data: json({"count": 200});
        --body: (${Array.from({length: data.count}, (_, i) => `<div class="row" data-n="${i}"></div>`).join("")})
    }
"#;

/// A document with `rows` pre-rendered rows and a generated table.
fn sample_document(rows: usize) -> String {
    let mut html = format!("<html><head><style>{STYLE}</style></head><body><section>");
    for n in 0..rows {
        let _ = write!(html, r#"<div class="row" data-n="{n}"></div>"#);
    }
    html.push_str(r#"</section><section class="table"></section></body></html>"#);
    html
}

// ============================================================================
// Full Pass Benchmarks
// ============================================================================

fn bench_render(c: &mut Criterion) {
    let html = sample_document(200);

    c.bench_function("render", |b| {
        b.iter(|| {
            let mut engine = Engine::new(&html);
            engine.render().unwrap()
        });
    });
}

fn bench_refresh_noop(c: &mut Criterion) {
    let mut engine = Engine::new(&sample_document(200));
    engine.render().unwrap();

    c.bench_function("refresh_noop", |b| {
        b.iter(|| engine.refresh().unwrap());
    });
}

// ============================================================================
// Compilation Benchmarks
// ============================================================================

fn bench_compile_rules(c: &mut Criterion) {
    let registry = ModeRegistry::with_builtin_modes();
    let options = RenderOptions::default();
    let sheet = StyleSheet::parse(STYLE);

    c.bench_function("compile_rules", |b| {
        b.iter(|| {
            let diagnostics = csspipe::report::Diagnostics::new();
            csspipe::walker::Walker::new(&registry, &options, &diagnostics)
                .walk(&sheet)
                .unwrap()
        });
    });
}

fn bench_template(c: &mut Criterion) {
    let template =
        Template::compile("<ul>${data.items.map(x => `<li>${x.name}</li>`).join('')}</ul>").unwrap();
    let items: Vec<_> = (0..100)
        .map(|i| serde_json::json!({"name": format!("item {i}")}))
        .collect();
    let data = serde_json::json!({ "items": items });
    let mut dom = csspipe::dom::parse_document("");

    c.bench_function("template_render", |b| {
        b.iter(|| template.render(&mut dom, None, &data).unwrap());
    });
}

criterion_group!(
    benches,
    // Full pass
    bench_render,
    bench_refresh_noop,
    // Compilation
    bench_compile_rules,
    bench_template,
);
criterion_main!(benches);
