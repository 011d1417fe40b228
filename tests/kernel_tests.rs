// tests/kernel_tests.rs

// Scheduler and quantum-state properties through the public API
use qnetsim::simulation::{Event, EventKind, Timeline};
use qnetsim::{
    apply_gate, apply_single_qubit_gate, check_normalization, fidelity, transition, BellState, Gate, GenerationState,
    NodeId, Outcome, OutcomeTracker, QuantumState, SimError, Trigger,
};
use num_complex::Complex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Job(usize);

impl EventKind for Job {
    fn kind(&self) -> &'static str {
        "job"
    }
}

// Helper: a random normalized single-qubit state
fn random_qubit(rng: &mut ChaCha8Rng) -> QuantumState {
    let raw: Vec<Complex<f64>> = (0..2).map(|_| Complex::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0))).collect();
    let norm = raw.iter().map(|c| c.norm_sqr()).sum::<f64>().sqrt();
    QuantumState::from_amplitudes(raw.into_iter().map(|c| c / norm).collect())
}

#[test]
fn test_dispatch_order_law_on_large_queue() -> Result<(), SimError> {
    let mut rng = ChaCha8Rng::seed_from_u64(11);
    let mut timeline = Timeline::with_capacity(100_000);
    let mut times = Vec::with_capacity(100_000);
    for i in 0..100_000 {
        let t = rng.gen_range(0..1_000u64);
        times.push(t);
        timeline.schedule(t, NodeId((i % 3) as u32), Job(i))?;
    }

    let mut expected: Vec<(u64, usize)> = times.iter().copied().zip(0..).collect();
    expected.sort(); // by time, then insertion index

    let mut seen = Vec::with_capacity(100_000);
    while let Some(event) = timeline.pop_next() {
        seen.push((event.time, event.payload.0));
    }
    assert_eq!(seen, expected);
    Ok(())
}

#[test]
fn test_now_never_decreases_with_cancellations() -> Result<(), SimError> {
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let mut timeline = Timeline::new();
    let mut ids = Vec::new();
    for i in 0..500 {
        ids.push(timeline.schedule(rng.gen_range(0..200u64), NodeId(0), Job(i))?);
    }
    let mut cancelled = 0;
    for id in ids.iter().step_by(3) {
        if timeline.cancel(*id) {
            cancelled += 1;
        }
    }

    let mut last = 0;
    let dispatched = timeline.run(&mut |event: Event<Job>, tl: &mut Timeline<Job>| {
        assert!(event.time >= last);
        assert_ne!(event.payload.0 % 3, 0, "cancelled event dispatched");
        last = tl.now();
        Ok(())
    })?;
    assert_eq!(dispatched as usize, 500 - cancelled);
    Ok(())
}

#[test]
fn test_gates_preserve_norm_on_random_states() -> Result<(), SimError> {
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let gates = [Gate::identity(), Gate::pauli_x(), Gate::pauli_y(), Gate::pauli_z(), Gate::hadamard(), Gate::rz(2.1)];
    for _ in 0..200 {
        let state = random_qubit(&mut rng);
        let pair = state.tensor(&random_qubit(&mut rng));
        for gate in &gates {
            check_normalization(&apply_gate(&state, gate)?, Some(1e-9))?;
            check_normalization(&apply_single_qubit_gate(&pair, gate, 1)?, Some(1e-9))?;
        }
    }
    Ok(())
}

#[test]
fn test_fidelity_is_symmetric_and_one_on_self() -> Result<(), SimError> {
    let mut rng = ChaCha8Rng::seed_from_u64(8);
    for _ in 0..200 {
        let a = random_qubit(&mut rng);
        let b = random_qubit(&mut rng);
        assert!((fidelity(&a, &b)? - fidelity(&b, &a)?).abs() < 1e-12);
        assert!((fidelity(&a, &a)? - 1.0).abs() < 1e-9);
        let f = fidelity(&a, &b)?;
        assert!((0.0..=1.0 + 1e-12).contains(&f));
    }
    Ok(())
}

#[test]
fn test_fidelity_rejects_dimension_mismatch() {
    let single = QuantumState::zero(1);
    let pair = QuantumState::bell(BellState::PhiPlus);
    assert_eq!(fidelity(&single, &pair), Err(SimError::DimensionMismatch { left: 2, right: 4 }));
}

#[test]
fn test_bell_states_are_orthonormal() -> Result<(), SimError> {
    let all = [BellState::PhiPlus, BellState::PhiMinus, BellState::PsiPlus, BellState::PsiMinus];
    for (i, a) in all.iter().enumerate() {
        for (j, b) in all.iter().enumerate() {
            let f = fidelity(&QuantumState::bell(*a), &QuantumState::bell(*b))?;
            let expected = if i == j { 1.0 } else { 0.0 };
            assert!((f - expected).abs() < 1e-12, "{} vs {}", a, b);
        }
    }
    Ok(())
}

#[test]
fn test_protocol_happy_and_failure_paths() -> Result<(), SimError> {
    let mut state = GenerationState::Idle;
    for trigger in [Trigger::Start, Trigger::PhotonEmitted, Trigger::Herald { success: true }] {
        state = transition(state, trigger)?;
    }
    assert_eq!(state, GenerationState::Entangled);

    let awaiting = transition(transition(GenerationState::Idle, Trigger::Start)?, Trigger::PhotonEmitted)?;
    assert_eq!(transition(awaiting, Trigger::Timeout)?, GenerationState::Raw);
    assert_eq!(transition(awaiting, Trigger::Herald { success: false })?, GenerationState::Raw);
    assert!(matches!(
        transition(GenerationState::Idle, Trigger::Timeout),
        Err(SimError::InvalidTransition { from: "IDLE", trigger: "TIMEOUT" })
    ));
    Ok(())
}

#[test]
fn test_tracker_invariants() {
    let mut tracker = OutcomeTracker::new();
    assert_eq!(tracker.success_rate(), 0.0);
    for i in 0..10 {
        if i % 4 == 0 {
            tracker.record(Outcome::Entangled, Some(0.9));
        } else {
            tracker.record(Outcome::Raw, None);
        }
    }
    assert_eq!(tracker.raw_count() + tracker.entangled_count(), 10);
    assert!((tracker.success_rate() - 0.3).abs() < 1e-12);
    assert_eq!(tracker.fidelities().len(), 3);
    assert_eq!(tracker.throughput(0), 0.0);
}
