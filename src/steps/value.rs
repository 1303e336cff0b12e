//! Step 5: buyer persona and value proposition canvas.
//!
//! Each half is worth 50 points, scaled by how many of its six fields are
//! filled. The halves are scored independently.

use super::{is_filled, scaled, FieldIssue};
use crate::types::{BuyerPersona, ValueCanvas};

const HALF_POINTS: usize = 50;
const BUYER_FIELDS: usize = 6;
const CANVAS_FIELDS: usize = 6;

/// Age range accepted for partial credit
pub fn age_counts(age: Option<f64>) -> bool {
    age.is_some_and(|a| a.is_finite() && a > 0.0 && a <= 120.0)
}

/// Age range required for the step to be complete
pub fn age_is_valid(age: Option<f64>) -> bool {
    age.is_some_and(|a| a.is_finite() && (1.0..=120.0).contains(&a))
}

fn buyer_text(b: &BuyerPersona) -> [(&'static str, &str); 5] {
    [
        ("buyer.name", b.name.as_str()),
        ("buyer.occupation", b.occupation.as_str()),
        ("buyer.motivations", b.motivations.as_str()),
        ("buyer.pains", b.pains.as_str()),
        ("buyer.needs", b.needs.as_str()),
    ]
}

fn canvas_text(c: &ValueCanvas) -> [(&'static str, &str); CANVAS_FIELDS] {
    [
        ("canvas.customer_jobs", c.customer_jobs.as_str()),
        ("canvas.customer_pains", c.customer_pains.as_str()),
        ("canvas.customer_gains", c.customer_gains.as_str()),
        ("canvas.products_services", c.products_services.as_str()),
        ("canvas.pain_relievers", c.pain_relievers.as_str()),
        ("canvas.gain_creators", c.gain_creators.as_str()),
    ]
}

pub fn buyer_fields(buyer: Option<&BuyerPersona>) -> usize {
    buyer.map_or(0, |b| {
        usize::from(age_counts(b.age)) + buyer_text(b).iter().filter(|(_, v)| is_filled(v)).count()
    })
}

pub fn canvas_fields(canvas: Option<&ValueCanvas>) -> usize {
    canvas.map_or(0, |c| canvas_text(c).iter().filter(|(_, v)| is_filled(v)).count())
}

pub fn is_complete(buyer: Option<&BuyerPersona>, canvas: Option<&ValueCanvas>) -> bool {
    let buyer_ok = buyer.is_some_and(|b| {
        age_is_valid(b.age) && buyer_text(b).iter().all(|(_, v)| is_filled(v))
    });
    buyer_ok && canvas_fields(canvas) == CANVAS_FIELDS
}

pub fn progress(buyer: Option<&BuyerPersona>, canvas: Option<&ValueCanvas>) -> u8 {
    let buyer_points = scaled(HALF_POINTS, buyer_fields(buyer), BUYER_FIELDS);
    let canvas_points = scaled(HALF_POINTS, canvas_fields(canvas), CANVAS_FIELDS);
    (buyer_points + canvas_points).min(100)
}

pub fn issues(buyer: Option<&BuyerPersona>, canvas: Option<&ValueCanvas>) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    match buyer {
        None => issues.push(FieldIssue::required("buyer")),
        Some(b) => {
            if !age_is_valid(b.age) {
                issues.push(FieldIssue::new("buyer.age", "must be a number from 1 to 120"));
            }
            for (field, value) in buyer_text(b) {
                if !is_filled(value) {
                    issues.push(FieldIssue::required(field));
                }
            }
        }
    }
    match canvas {
        None => issues.push(FieldIssue::required("canvas")),
        Some(c) => {
            for (field, value) in canvas_text(c) {
                if !is_filled(value) {
                    issues.push(FieldIssue::required(field));
                }
            }
        }
    }
    issues
}
