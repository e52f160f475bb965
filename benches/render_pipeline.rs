use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use palaver::ui::markdown::{extract_citations, render_assistant_content, RenderOptions};

fn make_answer(sections: usize) -> String {
    let mut answer = String::new();
    for i in 0..sections {
        answer.push_str(&format!("## Section {i}\n\n"));
        answer.push_str(
            "Lorem ipsum dolor sit amet [1], consectetur adipiscing elit [2]. \
             Sed do *eiusmod* tempor `incididunt` ut labore.\n\n",
        );
        answer.push_str("- first point\n- second point with [3](https://example.org/c)\n\n");
        answer.push_str("```rust\nfn main() {\n    println!(\"hello\");\n}\n```\n\n");
        answer.push_str("| key | value |\n|---|---|\n| a | 1 |\n| b | 2 |\n\n");
    }
    answer.push_str("Sources: https://example.com/a https://example.net/b\n");
    answer
}

fn bench_render_pipeline(c: &mut Criterion) {
    for &sections in &[4usize, 32usize] {
        let answer = make_answer(sections);

        let mut group = c.benchmark_group(format!("render_sections{sections}"));
        group.throughput(Throughput::Bytes(answer.len() as u64));

        for syntax in [false, true] {
            let options = RenderOptions {
                syntax_highlighting: syntax,
            };
            // Highlighting results are cached after the first pass.
            group.bench_function(BenchmarkId::new("render", format!("syntax={syntax}")), |b| {
                b.iter(|| render_assistant_content(&answer, &options))
            });
        }

        group.bench_function("citations_only", |b| b.iter(|| extract_citations(&answer)));
        group.finish();
    }
}

criterion_group!(benches, bench_render_pipeline);
criterion_main!(benches);
