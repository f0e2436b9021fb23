// Scheduler - Converts measure-relative note positions into absolute clock
// times and manages the lifecycle of the resulting note commitments
//
// Tempo changes, subsection changes, and measure edits all follow the same
// shape: retract the affected future commitments, then recommit from a start
// time that preserves the phase of playback already elapsed.

use std::collections::HashMap;
use std::rc::Rc;

use crate::clock::AudioClock;
use crate::emitter::{CancelRegistry, CancelToken, NoteEmitter};
use crate::note::Note;
use crate::sequence::{Sequence, SequenceId};
use crate::timeline::{Tempo, TimeSignature};

/// Lookahead used until the update cadence has been observed
const DEFAULT_LOOP_LOOKAHEAD_SECS: f64 = 10.0 / 60.0;

/// One sequence in the arena, paired with the backend that sounds its notes
struct SequenceSlot {
    sequence: Sequence,
    emitter: Box<dyn NoteEmitter>,
}

/// One emitted note of an active scheduling window
struct ScheduledNoteRecord {
    sequence_relative_time: f64,
    start_time: f64,
    token: CancelToken,
}

/// One active scheduling pass of one sequence
///
/// At most one record exists per sequence id at any time; every reschedule
/// path retracts and removes the old record before committing a new one.
struct ScheduledSequence {
    sequence_id: SequenceId,
    start_time: f64,
    notes: Vec<ScheduledNoteRecord>,
}

/// One-pole smoother over the spacing of `update` calls
///
/// The loop lookahead is derived from this: the driving loop only samples
/// time periodically, so looping is armed a few frames early.
struct UpdateDeltaSmoother {
    last_time: Option<f64>,
    smoothed: Option<f64>,
}

impl UpdateDeltaSmoother {
    const COEFFICIENT: f64 = 0.2;

    fn new() -> Self {
        Self {
            last_time: None,
            smoothed: None,
        }
    }

    fn tick(&mut self, now: f64) {
        if let Some(last) = self.last_time {
            let delta = (now - last).max(0.0);
            self.smoothed = Some(match self.smoothed {
                Some(current) => current + Self::COEFFICIENT * (delta - current),
                None => delta,
            });
        }
        self.last_time = Some(now);
    }

    fn smoothed_delta(&self) -> Option<f64> {
        self.smoothed
    }
}

/// Drives sample-accurate note playback against an injected clock
///
/// The scheduler owns its sequences (created with [`make_sequence`] and
/// addressed by id), computes an absolute time for every note in a
/// sequence's playback window, and hands each one to the sequence's
/// [`NoteEmitter`]. The retraction the emitter returns is tracked so that
/// tempo changes, subsection changes, and measure edits can cancel exactly
/// the commitments they invalidate.
///
/// All operations are total: unknown ids and out-of-range requests are
/// rejected by returning `false` with no mutation. Emitter callbacks and
/// before-schedule hooks must not call back into the scheduler.
///
/// [`make_sequence`]: Scheduler::make_sequence
pub struct Scheduler {
    clock: Rc<dyn AudioClock>,
    time_signature: TimeSignature,
    tempo: Tempo,

    start_time: f64,
    playing: bool,

    next_sequence_id: SequenceId,
    slots: HashMap<SequenceId, SequenceSlot>,
    active: Vec<ScheduledSequence>,
    registry: CancelRegistry,
    update_delta: UpdateDeltaSmoother,
}

impl Scheduler {
    pub fn new(clock: Rc<dyn AudioClock>, time_signature: TimeSignature, tempo: Tempo) -> Self {
        let start_time = clock.current_time();
        Self {
            clock,
            time_signature,
            tempo,
            start_time,
            playing: false,
            next_sequence_id: 0,
            slots: HashMap::new(),
            active: Vec::new(),
            registry: CancelRegistry::new(),
            update_delta: UpdateDeltaSmoother::new(),
        }
    }

    //
    // Clock and tempo
    //

    pub fn current_time(&self) -> f64 {
        self.clock.current_time()
    }

    /// Absolute time the current quantum grid is anchored at
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn elapsed_time(&self) -> f64 {
        self.current_time() - self.start_time
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn bpm(&self) -> f64 {
        self.tempo.bpm()
    }

    /// Duration of one measure at the current tempo: the unit of clean
    /// restart boundaries
    pub fn quantum_duration(&self) -> f64 {
        self.time_signature.duration_secs(1.0, self.tempo)
    }

    /// Absolute time of the most recent whole-measure boundary
    pub fn current_quantum_time(&self) -> f64 {
        let quantum = self.quantum_duration();
        self.start_time + (self.elapsed_time() / quantum).floor() * quantum
    }

    /// Absolute time of the next whole-measure boundary
    pub fn next_quantum_time(&self) -> f64 {
        self.current_quantum_time() + self.quantum_duration()
    }

    /// Convert seconds into measures at the current tempo; negative inputs
    /// map to -1
    pub fn secs_to_relative_time(&self, secs: f64) -> f64 {
        if secs < 0.0 {
            -1.0
        } else {
            secs / self.quantum_duration()
        }
    }

    /// Convert measures into seconds at the current tempo; negative inputs
    /// map to -1
    pub fn relative_time_to_secs(&self, relative_time: f64) -> f64 {
        if relative_time < 0.0 {
            -1.0
        } else {
            self.time_signature.duration_secs(relative_time, self.tempo)
        }
    }

    //
    // Transport
    //

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Start playing: the quantum grid is re-anchored at the current time
    pub fn play(&mut self) {
        if self.playing {
            return;
        }
        self.playing = true;
        self.start_time = self.clock.current_time();
    }

    /// Stop playing: every commitment at or after the current time is
    /// retracted and all active windows are dropped
    pub fn stop(&mut self) {
        if !self.playing {
            return;
        }
        self.playing = false;
        let now = self.clock.current_time();
        self.cancel_if(|_| true, move |_, start_time| start_time >= now);
        self.remove_all();
    }

    //
    // Sequences
    //

    /// Create a sequence bound to the backend that will sound its notes
    pub fn make_sequence(&mut self, emitter: impl NoteEmitter + 'static) -> SequenceId {
        let id = self.next_sequence_id;
        self.next_sequence_id += 1;
        let sequence = Sequence::new(id, self.time_signature, self.start_time);
        self.slots.insert(
            id,
            SequenceSlot {
                sequence,
                emitter: Box::new(emitter),
            },
        );
        id
    }

    pub fn sequence(&self, id: SequenceId) -> Option<&Sequence> {
        self.slots.get(&id).map(|slot| &slot.sequence)
    }

    pub fn sequence_mut(&mut self, id: SequenceId) -> Option<&mut Sequence> {
        self.slots.get_mut(&id).map(|slot| &mut slot.sequence)
    }

    /// Number of sequences with an active scheduling window
    pub fn active_window_count(&self) -> usize {
        self.active.len()
    }

    //
    // Scheduling
    //

    /// Commit every note in the sequence's playback window, starting the
    /// window at absolute time `start_at`
    pub fn schedule_sequence(&mut self, id: SequenceId, start_at: f64) -> bool {
        self.schedule_sequence_with_note_condition(id, start_at, |_, _, _| true)
    }

    /// Commit the notes of the sequence's playback window for which
    /// `note_condition(note, sequence_relative_time, absolute_time)` holds
    ///
    /// Any existing window for the sequence is retracted first, so one
    /// sequence never carries two overlapping sets of commitments. The
    /// sequence's before-schedule hooks fire just before the new window
    /// start is recorded.
    pub fn schedule_sequence_with_note_condition<F>(
        &mut self,
        id: SequenceId,
        start_at: f64,
        mut note_condition: F,
    ) -> bool
    where
        F: FnMut(&Note, f64, f64) -> bool,
    {
        if !self.slots.contains_key(&id) {
            return false;
        }

        let now = self.clock.current_time();
        if self.active.iter().any(|record| record.sequence_id == id) {
            self.cancel_if_matching_sequence(id, move |_, start_time| start_time >= now);
            self.remove_records_of(id);
        }

        let tempo = self.tempo;
        let registry = &mut self.registry;
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        let SequenceSlot { sequence, emitter } = slot;

        sequence.trigger_before_schedule_tasks(start_at);
        sequence.set_start_time(start_at);

        let actual = sequence.actual_num_measures();
        let measure_offset = sequence.measure_offset();
        let mut notes = Vec::new();
        let mut window_offset_secs = 0.0;

        if actual > 0 {
            for i in 0..sequence.num_measures() {
                let measure = &sequence.measures()[(measure_offset + i) % actual];
                let measure_duration = measure.duration_secs(tempo);

                for scheduled in measure.notes() {
                    let start_time =
                        scheduled.relative_start_time * measure_duration + start_at + window_offset_secs;
                    let sequence_relative =
                        scheduled.relative_start_time + (measure_offset + i) as f64;

                    if note_condition(&scheduled.note, sequence_relative, start_time) {
                        let cancel = emitter.note_on(scheduled.note, start_time, sequence_relative);
                        notes.push(ScheduledNoteRecord {
                            sequence_relative_time: sequence_relative,
                            start_time,
                            token: registry.register(cancel),
                        });
                    }
                }

                window_offset_secs += measure_duration;
            }
        }

        self.active.push(ScheduledSequence {
            sequence_id: id,
            start_time: start_at,
            notes,
        });
        true
    }

    /// Reap finished windows and restart looping sequences
    ///
    /// Call once per host frame. Looping is armed `loop_lookahead` before a
    /// window's nominal end so that the restart lands on the boundary even
    /// though the driving loop only samples time periodically.
    pub fn update(&mut self) {
        let now = self.clock.current_time();
        self.update_delta.tick(now);
        if !self.playing {
            return;
        }

        let lookahead = self.loop_lookahead();
        let tempo = self.tempo;

        let mut retained = Vec::with_capacity(self.active.len());
        let mut relaunch = Vec::new();
        let registry = &mut self.registry;
        let slots = &self.slots;

        for record in self.active.drain(..) {
            let Some(slot) = slots.get(&record.sequence_id) else {
                for note in &record.notes {
                    registry.forget(note.token);
                }
                continue;
            };

            let finish_time = record.start_time + slot.sequence.subsection_duration_secs(tempo);
            let looping = slot.sequence.loop_enabled && now >= finish_time - lookahead;

            if now >= finish_time || looping {
                // Notes still in flight between now and the window end stay
                // committed; only the bookkeeping is dropped.
                for note in &record.notes {
                    registry.forget(note.token);
                }
                if looping {
                    relaunch.push(record.sequence_id);
                }
            } else {
                retained.push(record);
            }
        }

        self.active = retained;

        if !relaunch.is_empty() {
            let next_start = self.next_quantum_time();
            for id in relaunch {
                log::trace!("looping sequence {id} at {next_start:.3}s");
                self.schedule_sequence(id, next_start);
            }
        }
    }

    /// Margin before a window's end at which looping is armed
    pub fn loop_lookahead(&self) -> f64 {
        match self.update_delta.smoothed_delta() {
            Some(delta) => 3.0 * delta,
            None => DEFAULT_LOOP_LOOKAHEAD_SECS,
        }
    }

    //
    // Cancellation
    //

    /// Retract every committed note matching both predicates. Sequences are
    /// matched by `sequence_predicate`; notes by
    /// `note_predicate(sequence_relative_time, absolute_time)`. Retraction
    /// is idempotent: a note already retracted is skipped.
    pub fn cancel_if<S, N>(&mut self, mut sequence_predicate: S, mut note_predicate: N)
    where
        S: FnMut(&Sequence) -> bool,
        N: FnMut(f64, f64) -> bool,
    {
        let registry = &mut self.registry;
        let slots = &self.slots;

        for record in &self.active {
            let matches = slots
                .get(&record.sequence_id)
                .map(|slot| sequence_predicate(&slot.sequence))
                .unwrap_or(false);
            if !matches {
                continue;
            }
            for note in &record.notes {
                if note_predicate(note.sequence_relative_time, note.start_time) {
                    registry.revoke(note.token);
                }
            }
        }
    }

    /// Retract matching notes of one sequence
    pub fn cancel_if_matching_sequence<N>(&mut self, id: SequenceId, note_predicate: N)
    where
        N: FnMut(f64, f64) -> bool,
    {
        self.cancel_if(move |sequence| sequence.id() == id, note_predicate);
    }

    /// Drop matching window records without retracting their notes
    pub fn remove_if<S>(&mut self, mut sequence_predicate: S)
    where
        S: FnMut(&Sequence) -> bool,
    {
        let registry = &mut self.registry;
        let slots = &self.slots;
        self.active.retain(|record| {
            let matches = slots
                .get(&record.sequence_id)
                .map(|slot| sequence_predicate(&slot.sequence))
                .unwrap_or(true);
            if matches {
                for note in &record.notes {
                    registry.forget(note.token);
                }
                false
            } else {
                true
            }
        });
    }

    /// Drop every window record without retracting notes
    pub fn remove_all(&mut self) {
        self.remove_if(|_| true);
    }

    fn remove_records_of(&mut self, id: SequenceId) -> usize {
        let registry = &mut self.registry;
        let mut removed = 0;
        self.active.retain(|record| {
            if record.sequence_id == id {
                for note in &record.notes {
                    registry.forget(note.token);
                }
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    //
    // Tempo changes
    //

    /// Phase-preserving tempo change
    ///
    /// The quantum grid is re-anchored so the fraction of the current
    /// quantum already elapsed is identical at the new tempo. Every playing
    /// sequence has its future commitments retracted and recommitted from a
    /// start time that keeps its elapsed position; notes at or before the
    /// current position are not re-fired.
    pub fn set_tempo(&mut self, tempo: Tempo) {
        let now = self.clock.current_time();
        let old_tempo = self.tempo;
        let old_quantum = self.time_signature.duration_secs(1.0, old_tempo);
        let prev_quantum_relative = ((now - self.start_time) / old_quantum).fract();

        self.tempo = tempo;
        let new_quantum = self.quantum_duration();
        self.start_time = now - new_quantum * prev_quantum_relative;

        if !self.playing {
            return;
        }

        log::debug!("tempo change {} -> {}", old_tempo, tempo);

        struct Restart {
            id: SequenceId,
            pending: bool,
            window_measure_index: f64,
            position: f64,
        }

        let mut restarts = Vec::new();
        for record in &self.active {
            let Some(slot) = self.slots.get(&record.sequence_id) else {
                continue;
            };
            let sequence = &slot.sequence;
            if sequence.num_measures() == 0 {
                continue;
            }

            if record.start_time > now {
                // Window has not begun: everything moves to the next boundary
                restarts.push(Restart {
                    id: record.sequence_id,
                    pending: true,
                    window_measure_index: 0.0,
                    position: 0.0,
                });
                continue;
            }

            // Elapsed phase is measured at the tempo the window was
            // committed under.
            let position = sequence.subsection_relative_current_time(old_tempo, now);
            if position < 0.0 {
                continue;
            }
            let window_measure_index =
                (position - sequence.measure_offset() as f64).floor().max(0.0);

            restarts.push(Restart {
                id: record.sequence_id,
                pending: false,
                window_measure_index,
                position,
            });
        }

        for restart in restarts {
            self.cancel_if_matching_sequence(restart.id, move |_, start_time| start_time >= now);
            self.remove_records_of(restart.id);

            if restart.pending {
                let start_at = self.next_quantum_time();
                self.schedule_sequence(restart.id, start_at);
            } else {
                let start_at =
                    self.current_quantum_time() - new_quantum * restart.window_measure_index;
                let position = restart.position;
                self.schedule_sequence_with_note_condition(
                    restart.id,
                    start_at,
                    move |_, sequence_relative, _| sequence_relative > position,
                );
            }
        }
    }

    /// Phase-preserving tempo change expressed in BPM
    pub fn set_bpm(&mut self, bpm: f64) {
        self.set_tempo(Tempo::new(bpm));
    }

    /// Nudge the tempo by `delta` BPM, saturating at the valid range
    pub fn shift_bpm(&mut self, delta: f64) {
        self.set_tempo(self.tempo.shifted(delta));
    }

    //
    // Structural edits
    //

    /// Restrict a sequence's playback window and recommit only the notes
    /// inside the new window. Out-of-range windows are rejected with no
    /// mutation.
    pub fn subsection_sequence(
        &mut self,
        id: SequenceId,
        offset: usize,
        num_measures: usize,
    ) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        if !slot.sequence.subsection(offset, num_measures) {
            return false;
        }
        self.restart_after_window_change(id);
        true
    }

    /// Restore a sequence's playback window to the full sequence and
    /// recommit accordingly
    pub fn clear_sequence_subsection(&mut self, id: SequenceId) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        slot.sequence.clear_subsection();
        self.restart_after_window_change(id);
        true
    }

    /// After a window change: retract the sequence's future commitments and
    /// restart on a clean boundary. Restarts at the boundary just crossed if
    /// it is within the loop lookahead, otherwise at the next one.
    fn restart_after_window_change(&mut self, id: SequenceId) {
        let had_window = self.remove_records_with_cancellation(id) > 0;
        if !had_window || !self.playing {
            return;
        }

        let now = self.clock.current_time();
        let current_quantum = self.current_quantum_time();
        let start_at = if now - current_quantum <= self.loop_lookahead() {
            current_quantum
        } else {
            self.next_quantum_time()
        };
        self.schedule_sequence(id, start_at);
    }

    /// Retract the sequence's future commitments, then drop its records.
    /// Returns the number of records dropped.
    fn remove_records_with_cancellation(&mut self, id: SequenceId) -> usize {
        let now = self.clock.current_time();
        self.cancel_if_matching_sequence(id, move |_, start_time| start_time >= now);
        self.remove_records_of(id)
    }

    /// Remove all notes from one measure and retract its outstanding future
    /// commitments. Other measures' commitments are untouched.
    pub fn clear_measure_in_sequence(&mut self, id: SequenceId, measure_index: usize) -> bool {
        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        if !slot.sequence.clear_measure(measure_index) {
            return false;
        }

        let now = self.clock.current_time();
        self.cancel_if_matching_sequence(id, move |sequence_relative, start_time| {
            sequence_relative.floor() as usize == measure_index && start_time >= now
        });
        true
    }

    /// Remove one measure and recommit the survivors from a start time that
    /// preserves the elapsed fractional position
    ///
    /// Rejected with no mutation when the sequence is subsectioned or the
    /// index is out of range.
    pub fn remove_measure_in_sequence(&mut self, id: SequenceId, measure_index: usize) -> bool {
        let now = self.clock.current_time();
        let tempo = self.tempo;

        let Some(slot) = self.slots.get_mut(&id) else {
            return false;
        };
        let sequence = &mut slot.sequence;
        if sequence.is_subsectioned() {
            return false;
        }

        // Capture the playback position against the old measure count
        let position = sequence.subsection_relative_current_time(tempo, now);

        if !sequence.remove_measure(measure_index) {
            return false;
        }
        let new_count = sequence.actual_num_measures();

        let had_window = self.remove_records_with_cancellation(id) > 0;
        if !had_window || !self.playing || new_count == 0 || position < 0.0 {
            return true;
        }

        let original_measure_index = position.floor().max(0.0) as usize;
        let fractional = position - position.floor();
        let preserved_position = (original_measure_index % new_count) as f64 + fractional;

        let measure_duration = self
            .slots
            .get(&id)
            .map(|slot| slot.sequence.measure_duration_secs(tempo))
            .unwrap_or(0.0);
        let start_at = now - preserved_position * measure_duration;

        self.schedule_sequence_with_note_condition(
            id,
            start_at,
            move |_, sequence_relative, _| sequence_relative > preserved_position,
        );
        true
    }

    //
    // Sequence queries threaded with the scheduler's clock and tempo
    //

    /// Live-record a note at the sequence's current playback position
    pub fn mark_note_onset(&mut self, id: SequenceId, note: Note) -> bool {
        let now = self.clock.current_time();
        let tempo = self.tempo;
        match self.slots.get_mut(&id) {
            Some(slot) => {
                slot.sequence.mark_note_onset(note, tempo, now);
                true
            }
            None => false,
        }
    }

    /// Index of the measure the sequence is currently playing
    pub fn current_measure_index(&self, id: SequenceId) -> Option<usize> {
        self.sequence(id)?
            .current_measure_index(self.tempo, self.current_time())
    }

    /// Sequence playback position in measures over the full sequence
    pub fn sequence_relative_current_time(&self, id: SequenceId) -> f64 {
        match self.sequence(id) {
            Some(sequence) => sequence.relative_current_time(self.tempo, self.current_time()),
            None => -1.0,
        }
    }

    /// Sequence playback position in measures within its playback window
    pub fn subsection_relative_current_time(&self, id: SequenceId) -> f64 {
        match self.sequence(id) {
            Some(sequence) => {
                sequence.subsection_relative_current_time(self.tempo, self.current_time())
            }
            None => -1.0,
        }
    }

    /// Full duration of a sequence at the current tempo
    pub fn sequence_duration_secs(&self, id: SequenceId) -> f64 {
        match self.sequence(id) {
            Some(sequence) => sequence.duration_secs(self.tempo),
            None => 0.0,
        }
    }

    /// Duration of a sequence's playback window at the current tempo
    pub fn subsection_duration_secs(&self, id: SequenceId) -> f64 {
        match self.sequence(id) {
            Some(sequence) => sequence.subsection_duration_secs(self.tempo),
            None => 0.0,
        }
    }
}
