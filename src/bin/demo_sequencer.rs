// Demo sequencer - drives the scheduler over a manually advanced clock
// Prints every note commitment and retraction instead of producing sound
// Run with: cargo run --bin demo_sequencer

use std::rc::Rc;

use loopline::{CancelFn, ManualClock, Note, Scheduler, Tempo, TimeSignature};

const FRAMES_PER_SECOND: u32 = 60;
const SIMULATED_SECONDS: u32 = 8;

fn main() {
    env_logger::init();

    println!("=== loopline demo ===");
    println!("Simulating {SIMULATED_SECONDS} s of playback at {FRAMES_PER_SECOND} fps\n");

    let clock = Rc::new(ManualClock::new(0.0));
    let mut scheduler = Scheduler::new(clock.clone(), TimeSignature::new(2, 4), Tempo::new(125.0));

    let melody = scheduler.make_sequence(print_emitter("melody"));
    let metronome = scheduler.make_sequence(print_emitter("metronome"));

    {
        let sequence = scheduler.sequence_mut(melody).unwrap();
        sequence.add_measures(2);
        sequence.schedule_note_onset(0.0, Note::new(-12));
        sequence.schedule_note_onset(0.5, Note::new(-5));
        sequence.schedule_note_onset(1.0, Note::new(12));
        sequence.schedule_note_onset(1.75, Note::new(7));
        sequence.loop_enabled = true;
    }

    {
        let sequence = scheduler.sequence_mut(metronome).unwrap();
        sequence.add_measure();
        sequence.schedule_note_onset(0.0, Note::new(0));
        sequence.schedule_note_onset(0.25, Note::new(1));
        sequence.schedule_note_onset(0.5, Note::new(-12));
        sequence.schedule_note_onset(0.5, Note::new(1));
        sequence.schedule_note_onset(0.75, Note::new(0));
        sequence.loop_enabled = true;
    }

    scheduler.play();
    let start = scheduler.current_quantum_time();
    scheduler.schedule_sequence(melody, start);
    scheduler.schedule_sequence(metronome, start);

    for frame in 0..=(SIMULATED_SECONDS * FRAMES_PER_SECOND) {
        clock.set(frame as f64 / FRAMES_PER_SECOND as f64);
        scheduler.update();

        if frame == 3 * FRAMES_PER_SECOND {
            println!("\n-- t=3s: nudging tempo +15 BPM (now {}) --\n", scheduler.tempo().shifted(15.0));
            scheduler.shift_bpm(15.0);
        }

        if frame == 5 * FRAMES_PER_SECOND {
            let current = scheduler.current_measure_index(melody).unwrap_or(0);
            println!("\n-- t=5s: looping only measure {current} of the melody --\n");
            scheduler.subsection_sequence(melody, current, 1);
        }
    }

    println!("\ndone: {} window(s) still active", scheduler.active_window_count());
}

fn print_emitter(name: &'static str) -> impl FnMut(Note, f64, f64) -> CancelFn {
    move |note, start_time, sequence_relative| {
        println!(
            "[{name}] note {:+} at {:.3}s (position {:.2}, rate {:.3})",
            note.semitone,
            start_time,
            sequence_relative,
            note.playback_rate()
        );
        Box::new(move || {
            println!(
                "[{name}] retracted note {:+} committed for {:.3}s",
                note.semitone, start_time
            );
        }) as CancelFn
    }
}
