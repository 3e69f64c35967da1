use criterion::{black_box, criterion_group, criterion_main, Criterion};

const SOURCE: &str = r#"
fib(n) {
    if (n < 2)
        return n;
    return fib(n - 1) + fib(n - 2);
}

sum(base, count) {
    auto total = 0;
    register i = 0;
    while (i < count) {
        total = total + base[i];
        i = i + 1;
    }
    return total;
}

main() {
    auto values = alloc(10 * 8);
    register i = 0;
    while (i < 10) {
        values[i] = fib(i);
        i = i + 1;
    }
    if (sum(values, 10) > 100 && values[0] == 0)
        return 1;
    return 0;
}
"#;

fn frontend_benchmark(c: &mut Criterion) {
    c.bench_function("parse", |b| {
        b.iter(|| clonk::parser::parse(black_box(SOURCE)))
    });

    c.bench_function("parse_and_lower", |b| {
        b.iter(|| clonk::compile(black_box(SOURCE)).expect("benchmark source should compile"))
    });
}

criterion_group!(benches, frontend_benchmark);
criterion_main!(benches);
