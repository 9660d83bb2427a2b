use crate::models::branch_rates::BranchRateModel;
use crate::models::leaf_likelihood::LeafLikelihood;
use crate::models::site_model::SiteModel;
use crate::models::substitution::SubstitutionModel;
use crate::tree::rooted_tree::RootedTree;
use crate::{make_error, make_internal_report};
use eyre::Report;
use ndarray::Array2;

/// The collaborators a Gibbs site update reads from. Nothing here is owned by the sampler.
#[derive(Clone, Copy)]
pub struct GibbsModel<'a> {
  pub tree: &'a dyn RootedTree,
  pub site_model: &'a dyn SiteModel,
  pub substitution_model: &'a dyn SubstitutionModel,
  /// Absent means rate 1 on every branch
  pub branch_rates: Option<&'a dyn BranchRateModel>,
  pub leaf_likelihood: &'a dyn LeafLikelihood,
}

impl<'a> GibbsModel<'a> {
  /// Transition probabilities along the branch above `node` under rate `category`, written into `matrix`.
  pub fn branch_transition(&self, node: usize, category: usize, matrix: &mut Array2<f64>) -> Result<(), Report> {
    let parent = self
      .tree
      .parent(node)
      .ok_or_else(|| make_internal_report!("Requested transition matrix above node {node}, which has no parent"))?;

    let branch_rate = self.branch_rates.map_or(1.0, |b| b.rate_for_branch(node));
    let rate = branch_rate * self.site_model.rate_for_category(category, node);

    self
      .substitution_model
      .transition_matrix(node, self.tree.age(parent), self.tree.age(node), rate, matrix);

    if let Some(p) = matrix.iter().find(|p| !(p.is_finite() && **p >= 0.0)) {
      return make_error!(
        "Substitution model returned an invalid transition probability {p} for the branch above node {node} \
        (category {category}, rate {rate})"
      );
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::gibbs::test_utils::two_state_fixture;
  use crate::models::branch_rates::{PerBranchRates, StrictClock};
  use crate::utils::error::report_to_string;
  use approx::assert_ulps_eq;
  use rstest::rstest;

  #[rstest]
  fn multiplies_branch_and_category_rates() -> Result<(), Report> {
    let fixture = two_state_fixture("(A:1,B:1);", 1, &[0.5, 2.0])?;
    let clock = StrictClock { rate: 4.0 };
    let model = GibbsModel {
      branch_rates: Some(&clock),
      ..fixture.model()
    };
    let mut matrix = Array2::zeros((2, 2));

    // 4 * 0.5 = 2 units: P(stay) = 0.82
    model.branch_transition(0, 0, &mut matrix)?;
    assert_ulps_eq!(matrix[[0, 0]], 0.82, epsilon = 1e-12);

    // 4 * 2 = 8 units
    model.branch_transition(0, 1, &mut matrix)?;
    assert_ulps_eq!(matrix[[1, 1]], 0.5 + 0.5 * 0.8_f64.powi(8), epsilon = 1e-12);
    Ok(())
  }

  #[rstest]
  fn rejects_invalid_branch_rate() -> Result<(), Report> {
    let fixture = two_state_fixture("(A:1,B:1);", 1, &[1.0])?;
    let rates = PerBranchRates { rates: vec![1.0] };
    let model = GibbsModel {
      branch_rates: Some(&rates),
      ..fixture.model()
    };
    let mut matrix = Array2::zeros((2, 2));

    model.branch_transition(0, 0, &mut matrix)?;
    let err = model.branch_transition(1, 0, &mut matrix).unwrap_err();
    assert!(report_to_string(&err).contains("branch above node 1"));
    Ok(())
  }

  #[rstest]
  fn root_has_no_branch() -> Result<(), Report> {
    let fixture = two_state_fixture("(A:1,B:1);", 1, &[1.0])?;
    let model = fixture.model();
    let mut matrix = Array2::zeros((2, 2));
    assert!(model.branch_transition(model.tree.root(), 0, &mut matrix).is_err());
    Ok(())
  }
}
