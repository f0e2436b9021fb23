//! Scheduler throughput benchmarks
//!
//! Measures the cost of committing a full window of notes, the per-frame
//! update with looping sequences, and the wrapping note-position queries.

use std::rc::Rc;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use loopline::{CancelFn, ManualClock, Note, Scheduler, SequenceId, Tempo, TimeSignature};

fn noop_emitter() -> impl FnMut(Note, f64, f64) -> CancelFn {
    move |_, _, _| Box::new(|| {}) as CancelFn
}

fn build_scheduler(
    num_measures: usize,
    notes_per_measure: usize,
) -> (Rc<ManualClock>, Scheduler, SequenceId) {
    let clock = Rc::new(ManualClock::new(0.0));
    let mut scheduler = Scheduler::new(
        clock.clone(),
        TimeSignature::four_four(),
        Tempo::new(120.0),
    );
    let id = scheduler.make_sequence(noop_emitter());

    let sequence = scheduler.sequence_mut(id).unwrap();
    sequence.add_measures(num_measures);
    for measure in 0..num_measures {
        for slot in 0..notes_per_measure {
            let position = measure as f64 + slot as f64 / notes_per_measure as f64;
            sequence.schedule_note_onset(position, Note::new((slot % 24) as i32 - 12));
        }
    }

    (clock, scheduler, id)
}

fn bench_schedule_sequence(c: &mut Criterion) {
    // 64 measures x 16 notes: one full window commit per iteration
    let (_clock, mut scheduler, id) = build_scheduler(64, 16);
    scheduler.play();

    c.bench_function("schedule_1024_notes", |b| {
        b.iter(|| {
            scheduler.schedule_sequence(black_box(id), 0.0);
        })
    });
}

fn bench_update_with_looping(c: &mut Criterion) {
    let (clock, mut scheduler, id) = build_scheduler(1, 8);
    scheduler.sequence_mut(id).unwrap().loop_enabled = true;
    scheduler.play();
    scheduler.schedule_sequence(id, 0.0);

    let mut frame = 0u64;
    c.bench_function("update_60fps_looping", |b| {
        b.iter(|| {
            frame += 1;
            clock.set(frame as f64 / 60.0);
            scheduler.update();
        })
    });
}

fn bench_next_note_query(c: &mut Criterion) {
    let (_clock, mut scheduler, id) = build_scheduler(32, 8);
    scheduler
        .sequence_mut(id)
        .unwrap()
        .subsection(4, 24);

    let mut position = 0.0;
    c.bench_function("next_relative_note_time", |b| {
        b.iter(|| {
            position = (position + 0.37) % 32.0;
            let sequence = scheduler.sequence(id).unwrap();
            black_box(sequence.next_relative_note_time(black_box(position), false, None))
        })
    });
}

criterion_group!(
    benches,
    bench_schedule_sequence,
    bench_update_with_looping,
    bench_next_note_query
);
criterion_main!(benches);
