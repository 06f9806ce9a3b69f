use bitframe::bits::ByteOrder;
use bitframe::container::Container;
use bitframe::field::{Field, Width};
use bitframe::schema::Schema;
use criterion::{Criterion, criterion_group, criterion_main};

fn gen_schema() -> Schema {
    let element = Container::aligned()
        .with(Field::u8("id"))
        .unwrap()
        .with(Field::uint("value", Width::W16, ByteOrder::Little))
        .unwrap();
    let root = Container::aligned()
        .with(Field::uint("count", Width::W16, ByteOrder::Big))
        .unwrap()
        .with(Field::repeat_from(
            "items",
            "count",
            Field::nested("item", element),
        ))
        .unwrap();
    Schema::new(root).unwrap()
}

fn gen_packet(count: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(2 + count * 3);
    data.extend_from_slice(&(count as u16).to_be_bytes());

    // Deterministic but non-trivial pattern
    for i in 0..count {
        data.push((i * 31 % 256) as u8);
        data.extend_from_slice(&((i * 7919 % 65536) as u16).to_le_bytes());
    }

    data
}

fn bench_record_decode(c: &mut Criterion) {
    let schema = gen_schema();

    for &count in &[1usize, 10, 100, 1000] {
        let packet = gen_packet(count);

        c.bench_function(&format!("decode_{}_items", count), |b| {
            b.iter(|| {
                let _ = schema.decode(&packet).unwrap();
            })
        });
    }
}

criterion_group!(benches, bench_record_decode);
criterion_main!(benches);
