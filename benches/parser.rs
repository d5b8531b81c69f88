use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rdsh::parser::Parser;

/// Parsing cost for lines of increasing pipeline length
fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    let parser = Parser::default();

    let lines = [
        ("single", "ls -la /tmp".to_string()),
        ("redirects", "sort -r < input.txt > output.txt".to_string()),
        ("quoted", "grep \"needle in a haystack\" notes.txt".to_string()),
        (
            "eight_stages",
            vec!["cat data.txt"; 8].join(" | "),
        ),
    ];

    for (name, line) in &lines {
        group.bench_with_input(BenchmarkId::from_parameter(name), line, |b, line| {
            b.iter(|| parser.parse(black_box(line)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse);
criterion_main!(benches);
