use criterion::{Criterion, black_box, criterion_group, criterion_main};

use tracker_auth::{PermissionSet, Requirement, default_menu, filter_menu, is_granted};

fn bench_filter_menu(c: &mut Criterion) {
    let menu = default_menu();
    let member = PermissionSet::new().with_codes(["project:read", "task:read", "bug:read", "user:read"]);
    let admin = PermissionSet::new().with_roles(["admin"]);

    c.bench_function("filter_menu/member", |b| {
        b.iter(|| filter_menu(black_box(&menu), black_box(&member)))
    });
    c.bench_function("filter_menu/admin", |b| {
        b.iter(|| filter_menu(black_box(&menu), black_box(&admin)))
    });
}

fn bench_lookup(c: &mut Criterion) {
    let codes: Vec<String> = (0..500).map(|i| format!("resource{i}:read")).collect();
    let set = PermissionSet::new().with_codes(codes);
    let hit = Requirement::single(String::from("resource250:read"));
    let miss = Requirement::any_of([String::from("nope:read"), String::from("nada:write")]);

    c.bench_function("is_granted/hit", |b| b.iter(|| is_granted(black_box(&set), black_box(&hit))));
    c.bench_function("is_granted/miss", |b| b.iter(|| is_granted(black_box(&set), black_box(&miss))));
}

criterion_group!(benches, bench_filter_menu, bench_lookup);
criterion_main!(benches);
