//! Local datasets used when generation is unavailable.
//!
//! Every dataset satisfies its step's completeness rule on its own, so a
//! team that falls back here is never blocked by placeholder content.

use super::StepPayload;
use crate::types::{
    BuyerPersona, Feasibility, Idea, InnovationLevel, MeansPatch, Problem, StepId, Trend,
    TrendKind, ValueCanvas,
};

const PROBLEM_DESCRIPTION: &str = "Many small neighbourhood shops lose customers to large \
chains and delivery apps because they cannot offer online ordering, reliable stock \
information or fast delivery. Owners lack the time, skills and budget to adopt digital tools \
on their own, so sales keep falling.";

const PROBLEM_AFFECTED: &str = "Owners and employees of independent grocery, hardware and \
stationery shops in mid-sized cities, most of them family businesses with fewer than five \
workers, plus the older neighbours who depend on these nearby shops for their daily \
purchases and personal attention.";

const PROBLEM_RELEVANCE: &str = "Local commerce sustains employment, keeps money circulating \
inside the community and gives life to public spaces. When these shops close, neighbourhoods \
lose jobs, safety and social ties, and residents without a car or internet access lose \
convenient access to basic goods.";

const PROBLEM_MEANS_LINK: &str = "Our team combines retail experience from family shops, \
software development skills and contacts in the local merchants association. With a modest \
starting budget and a borrowed vehicle we can pilot a shared ordering and delivery service in \
our own neighbourhood first.";

const IDEA_JUSTIFICATION: &str = "The shared ordering platform builds directly on our \
software skills and our contacts in the merchants association, needs little capital to \
pilot, and addresses the main pain of shop owners: reaching customers who now buy online. \
It can start in one neighbourhood and grow shop by shop.";

/// Complete placeholder data for `step`
pub fn fallback(step: StepId) -> StepPayload {
    match step {
        StepId::Means => StepPayload::Means(MeansPatch {
            identity: Some("Curious, persistent and community minded".to_string()),
            knowledge: Some("Retail operations, basic accounting and web development".to_string()),
            network: Some("Local merchants association and university alumni".to_string()),
            resources: Some("Laptop, small savings and a borrowed delivery van".to_string()),
        }),
        StepId::Problem => StepPayload::Problem(Problem {
            title: "Neighbourhood shops cannot compete online".to_string(),
            description: PROBLEM_DESCRIPTION.to_string(),
            affected: PROBLEM_AFFECTED.to_string(),
            relevance: PROBLEM_RELEVANCE.to_string(),
            means_link: PROBLEM_MEANS_LINK.to_string(),
        }),
        StepId::Trends => StepPayload::Trends(vec![
            Trend::new(
                "Proximity shopping",
                TrendKind::Consumer,
                "Customers value buying close to home",
                "Growth of local delivery cooperatives",
            ),
            Trend::new(
                "Mobile-first commerce",
                TrendKind::Technological,
                "Most purchases start on a phone",
                "Messaging apps used to take orders",
            ),
            Trend::new(
                "Sustainable consumption",
                TrendKind::Environmental,
                "Preference for short supply chains",
                "Zero-waste stores and bulk refills",
            ),
        ]),
        StepId::Ideation => {
            let mut ideas = vec![
                Idea::new(
                    "Shared online ordering platform for neighbourhood shops",
                    "Platform",
                    InnovationLevel::Incremental,
                    Feasibility::High,
                ),
                Idea::new(
                    "Bicycle delivery service shared by several shops",
                    "Service",
                    InnovationLevel::Incremental,
                    Feasibility::Medium,
                ),
                Idea::new(
                    "Digital loyalty card valid across local shops",
                    "Product",
                    InnovationLevel::Radical,
                    Feasibility::Medium,
                ),
                Idea::new(
                    "Workshops teaching shop owners basic digital marketing",
                    "Service",
                    InnovationLevel::Incremental,
                    Feasibility::High,
                ),
                Idea::new(
                    "Automated stock sharing between nearby shops",
                    "Platform",
                    InnovationLevel::Disruptive,
                    Feasibility::Low,
                ),
            ];
            ideas[0].selected = true;
            ideas[0].justification = Some(IDEA_JUSTIFICATION.to_string());
            StepPayload::Ideas(ideas)
        }
        StepId::ValueProposition => StepPayload::ValueProposition {
            buyer: BuyerPersona {
                name: "Carmen, shop owner".to_string(),
                age: Some(30.0),
                occupation: "Owner of a family grocery store".to_string(),
                motivations: "Keep the family business alive and serve her neighbours".to_string(),
                pains: "Falling sales and no time to learn digital tools".to_string(),
                needs: "A simple way to receive and deliver online orders".to_string(),
            },
            canvas: ValueCanvas {
                customer_jobs: "Sell daily goods and keep regular customers".to_string(),
                customer_pains: "Competition from apps and chains, little free time".to_string(),
                customer_gains: "More orders without extra staff".to_string(),
                products_services: "Shared ordering platform with delivery".to_string(),
                pain_relievers: "Ready-made online store set up for her".to_string(),
                gain_creators: "Joint promotions with other local shops".to_string(),
            },
        },
    }
}
