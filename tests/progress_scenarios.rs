//! End-to-end scoring scenarios over the public API
//!
//! ```bash
//! cargo test --test progress_scenarios
//! ```

use uuid::Uuid;
use venture_journal::progress::compute_overall;
use venture_journal::steps::{self, ideation, ProgressContext};
use venture_journal::types::{
    BuyerPersona, Feasibility, Idea, InnovationLevel, JournalData, JournalStatus, MemberMeans,
    Problem, StepId, Trend, TrendKind, ValueCanvas,
};

// ─── Builders ────────────────────────────────────────────────────────────────

fn text(len: usize) -> String {
    "x".repeat(len)
}

fn member() -> MemberMeans {
    let mut means = MemberMeans::new(Uuid::new_v4());
    means.identity = "Ingeniera industrial".to_string();
    means
}

fn problem(affected_len: usize) -> Problem {
    Problem {
        title: "Residuos electrónicos".to_string(),
        description: text(200),
        affected: text(affected_len),
        relevance: text(200),
        means_link: text(200),
    }
}

fn trend(name: &str) -> Trend {
    Trend::new(name, TrendKind::Social, "Breve", "Ejemplo concreto")
}

fn ideas(justification_len: usize) -> Vec<Idea> {
    let mut ideas: Vec<Idea> = (0..5)
        .map(|i| {
            Idea::new(
                format!("Idea {i}"),
                "Servicio",
                InnovationLevel::Incremental,
                Feasibility::Medium,
            )
        })
        .collect();
    ideas[2].selected = true;
    ideas[2].justification = Some(text(justification_len));
    ideas
}

fn buyer() -> BuyerPersona {
    BuyerPersona {
        name: "Jorge".to_string(),
        age: Some(52.0),
        occupation: "Técnico de reparación".to_string(),
        motivations: "Independencia".to_string(),
        pains: "Repuestos caros".to_string(),
        needs: "Proveedores confiables".to_string(),
    }
}

fn canvas() -> ValueCanvas {
    ValueCanvas {
        customer_jobs: "Reparar equipos".to_string(),
        customer_pains: "Tiempos de espera".to_string(),
        customer_gains: "Clientes recurrentes".to_string(),
        products_services: "Marketplace de repuestos".to_string(),
        pain_relievers: "Entrega en 24 horas".to_string(),
        gain_creators: "Garantía extendida".to_string(),
    }
}

fn complete_journal() -> JournalData {
    JournalData {
        means: vec![member(), member()],
        problem: Some(problem(200)),
        trends: vec![trend("Reparabilidad"), trend("Economía circular"), trend("Hazlo tú mismo")],
        ideas: ideas(250),
        buyer: Some(buyer()),
        canvas: Some(canvas()),
    }
}

fn two_members() -> ProgressContext {
    ProgressContext::new(2)
}

// ─── Scenarios ───────────────────────────────────────────────────────────────

#[test]
fn test_complete_journal_is_fully_unlocked() {
    let overall = compute_overall(&complete_journal(), &two_members());

    assert_eq!(overall.total_progress, 100);
    for step in &overall.steps {
        assert!(step.completed, "step {} incomplete", step.step);
        assert!(!step.locked, "step {} locked", step.step);
        assert_eq!(step.progress, 100);
    }
    assert_eq!(JournalStatus::derive(&overall), JournalStatus::Ready);
}

#[test]
fn test_short_affected_field_locks_trends() {
    let mut data = complete_journal();
    data.problem = Some(problem(199));

    let overall = compute_overall(&data, &two_members());
    let problem = overall.step(StepId::Problem);
    assert!(!problem.completed);
    assert_eq!(problem.progress, 80);
    assert!(overall.is_locked(StepId::Trends));
    assert_eq!(overall.total_progress, 96);

    // Later steps keep their own scores
    for step in [StepId::Trends, StepId::Ideation, StepId::ValueProposition] {
        assert!(overall.step(step).completed);
        assert_eq!(overall.step(step).progress, 100);
    }
    assert!(!overall.is_locked(StepId::Ideation));
    assert_eq!(JournalStatus::derive(&overall), JournalStatus::InProgress);
}

#[test]
fn test_empty_journal_is_draft() {
    let overall = compute_overall(&JournalData::default(), &two_members());
    assert_eq!(overall.total_progress, 0);
    assert!(!overall.is_locked(StepId::Means));
    for step in &StepId::ALL[1..] {
        assert!(overall.is_locked(*step));
    }
    assert_eq!(JournalStatus::derive(&overall), JournalStatus::Draft);
}

#[test]
fn test_gating_follows_previous_completion() {
    let mut data = complete_journal();
    data.trends.truncate(2);

    let overall = compute_overall(&data, &two_members());
    assert!(!overall.steps[0].locked);
    for i in 1..5 {
        assert_eq!(overall.steps[i].locked, !overall.steps[i - 1].completed);
    }
    assert!(overall.is_locked(StepId::Ideation));
    assert!(!overall.is_locked(StepId::ValueProposition));
}

#[test]
fn test_trend_plateau() {
    for (count, expected) in [(0, 0), (1, 33), (2, 67), (3, 100), (4, 100), (50, 100)] {
        let trends: Vec<Trend> = (0..count).map(|i| trend(&format!("T{i}"))).collect();
        assert_eq!(steps::trends::progress(&trends), expected, "{count} trends");
    }
}

#[test]
fn test_justification_boundary() {
    assert_eq!(ideation::progress(&ideas(199)), 80);
    assert_eq!(ideation::progress(&ideas(200)), 100);
}

#[test]
fn test_double_toggle_restores_selection() {
    let mut list = ideas(250);
    list[2].selected = false;
    let before = list.clone();

    assert_eq!(ideation::toggle_selection(&mut list, 4), Some(true));
    assert_eq!(ideation::toggle_selection(&mut list, 4), Some(false));

    assert_eq!(list, before);
}

#[test]
fn test_selecting_replaces_previous_choice() {
    let mut list = ideas(250);
    ideation::toggle_selection(&mut list, 0);

    let selected: Vec<usize> = (0..5).filter(|&i| list[i].selected).collect();
    assert_eq!(selected, [0]);
    // The old choice keeps its justification text
    assert!(list[2].justification.is_some());
}

#[test]
fn test_idempotent_aggregate() {
    let data = complete_journal();
    let ctx = two_members();
    assert_eq!(compute_overall(&data, &ctx), compute_overall(&data, &ctx));
}
