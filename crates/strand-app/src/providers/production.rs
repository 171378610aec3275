use std::rc::Rc;

use anyhow::Context;
use strand_core::*;

use crate::model::{ProductId, ProductionStep, StepId};
use crate::repository::ProductionRepository;

#[derive(Clone)]
pub struct ProductionProviders {
    /// Steps of one product, ordered by position.
    pub steps_for_product: FutureProviderFamily<ProductId, Vec<ProductionStep>>,
    pub step_by_id: FutureProviderFamily<StepId, Option<ProductionStep>>,
}

impl ProductionProviders {
    pub fn new(repo: Rc<dyn ProductionRepository>) -> Self {
        let steps_for_product = FutureProviderFamily::new("steps_for_product", {
            let repo = repo.clone();
            move |_, product: ProductId| {
                let repo = repo.clone();
                async move {
                    repo.steps(product)
                        .await
                        .with_context(|| format!("loading steps of product {product}"))
                }
            }
        });

        let step_by_id = FutureProviderFamily::new("step_by_id", move |_, id: StepId| {
            let repo = repo.clone();
            async move {
                repo.step(id)
                    .await
                    .with_context(|| format!("loading step {id}"))
            }
        });

        Self {
            steps_for_product,
            step_by_id,
        }
    }
}
