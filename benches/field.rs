use std::io;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use receptive_field::logging::NullSink;
use receptive_field::{
    FieldConfig, FieldElement, FieldRuntime, Logger, Placement, ReceptiveField, Result, TextBuffer,
};

const FLOATING: [Placement; 4] = [
    Placement::AnchoredTop,
    Placement::SlideTop,
    Placement::SlideBottom,
    Placement::AnchoredBottom,
];

fn framed_field(viewport: Option<usize>) -> Result<(ReceptiveField, Vec<FieldElement>)> {
    let mut builder = ReceptiveField::builder().logger(Logger::new(NullSink));
    if let Some(rows) = viewport {
        builder = builder.viewport_rows(rows);
    }
    let field = builder.build();
    let elements = vec![
        FieldElement::text(Placement::PinnedTop, "header\n", Some(&field))?,
        FieldElement::text(Placement::PinnedBottom, "> \n", Some(&field))?,
    ];
    Ok((field, elements))
}

fn placement_churn(c: &mut Criterion) {
    c.bench_function("placement_churn", |b| {
        b.iter(|| {
            let (field, _frame) = framed_field(None).expect("field");
            let mut windows = Vec::with_capacity(64);
            for i in 0..64 {
                let placement = FLOATING[i % FLOATING.len()];
                windows.push(
                    FieldElement::text(placement, format!("window {i}\n"), Some(&field))
                        .expect("place"),
                );
            }
            for window in windows.iter().step_by(3) {
                window.slot().replace(Placement::SlideTop).expect("replace");
            }
            windows.truncate(16);
            black_box(field.len());
        });
    });
}

fn render_with_overflow(c: &mut Criterion) {
    let (field, _frame) = framed_field(Some(24)).expect("field");
    let buffer = std::sync::Arc::new(TextBuffer::new());
    let log = FieldElement::from_arc(Placement::SlideBottom, buffer.clone(), Some(&field))
        .expect("log window");
    let mut line = 0usize;
    c.bench_function("render_with_overflow", |b| {
        b.iter(|| {
            line += 1;
            buffer.add_text(&format!("event {line}"));
            log.refresh();
            black_box(field.render().expect("render"));
        });
    });
}

fn runtime_present(c: &mut Criterion) {
    c.bench_function("runtime_present", |b| {
        b.iter(|| {
            let mut runtime = FieldRuntime::new(FieldConfig::default()).expect("runtime");
            let mut sink = io::sink();
            for i in 0..8 {
                runtime.set_input(&format!("typing {i}"));
                runtime.present(&mut sink).expect("present");
            }
            black_box(runtime.shutdown());
        });
    });
}

criterion_group!(benches, placement_churn, render_with_overflow, runtime_present);
criterion_main!(benches);
