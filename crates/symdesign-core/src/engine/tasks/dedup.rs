use crate::engine::cloud::PointCloud;
use crate::engine::constraints::Problem;
use itertools::Itertools;
use std::cmp::Ordering;
use tracing::{info, instrument};

fn within_resolution(a: &[f64], b: &[f64], resolutions: &[f64]) -> bool {
    a.iter()
        .zip(b)
        .zip(resolutions)
        .all(|((x, y), step)| (x - y).abs() < *step)
}

/// Removes points lying within one resolution step of an earlier kept point in every
/// dimension.
///
/// Points are swept in order of their first coordinate, so only neighbours inside a one-step
/// window of that coordinate are compared. Kept points retain their original order.
#[instrument(skip_all, name = "dedup_task")]
pub fn run(cloud: PointCloud, problem: &Problem) -> PointCloud {
    let count = cloud.len();
    if count < 2 {
        return cloud;
    }
    let resolutions = problem.resolutions();
    let first_step = resolutions[0];

    let order: Vec<usize> = (0..count)
        .sorted_by(|&a, &b| {
            cloud.point(a)[0]
                .partial_cmp(&cloud.point(b)[0])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        })
        .collect();

    let mut removed = vec![false; count];
    for (rank, &i) in order.iter().enumerate() {
        if removed[i] {
            continue;
        }
        let anchor = cloud.point(i);
        for &j in &order[rank + 1..] {
            let candidate = cloud.point(j);
            if candidate[0] - anchor[0] >= first_step {
                break;
            }
            if !removed[j] && within_resolution(anchor, candidate, resolutions) {
                removed[j] = true;
            }
        }
    }

    let keep: Vec<bool> = removed.iter().map(|r| !r).collect();
    let deduped = cloud.retain_mask(&keep);
    info!(
        points = count,
        survivors = deduped.len(),
        "Deduplication complete."
    );
    deduped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expr::Expr;
    use crate::engine::constraints::{Bounds, ConstraintSet, Resolutions};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn problem() -> Problem {
        let mut set = ConstraintSet::new();
        set.add_equation("sum", (Expr::unknown("x") + Expr::unknown("y")).eq_to(10.0))
            .unwrap();
        let bounds: Bounds = [("x", (0.0, 10.0)), ("y", (0.0, 10.0))]
            .into_iter()
            .map(|(n, b)| (n.to_string(), b))
            .collect();
        let resolutions: Resolutions = [("x", 0.1), ("y", 1.0)]
            .into_iter()
            .map(|(n, r)| (n.to_string(), r))
            .collect();
        set.prepare(&bounds, &resolutions).unwrap()
    }

    #[test]
    fn near_duplicates_collapse_onto_the_first_kept_point() {
        let problem = problem();
        let cloud = PointCloud::from_rows(
            2,
            &[[5.0, 5.0], [5.05, 5.5], [5.0, 6.5], [5.2, 5.0], [5.04, 4.2]],
        )
        .unwrap();

        let deduped = run(cloud, &problem);

        let kept: Vec<&[f64]> = deduped.points().collect();
        assert_eq!(kept, vec![&[5.0, 5.0][..], &[5.0, 6.5][..], &[5.2, 5.0][..]]);
    }

    #[test]
    fn no_two_survivors_are_within_resolution() {
        let problem = problem();
        let mut rng = StdRng::seed_from_u64(11);
        let mut cloud = PointCloud::from_rows(2, &[[5.0, 5.0]]).unwrap();
        cloud.add_mutations(&problem, 400, 3.0, &mut rng);
        let before = cloud.len();

        let deduped = run(cloud, &problem);

        assert!(deduped.len() <= before);
        let points: Vec<&[f64]> = deduped.points().collect();
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                assert!(!within_resolution(a, b, problem.resolutions()));
            }
        }
    }

    #[test]
    fn tiny_clouds_pass_through() {
        let problem = problem();
        assert!(run(PointCloud::new(2), &problem).is_empty());
        let single = PointCloud::from_rows(2, &[[1.0, 1.0]]).unwrap();
        assert_eq!(run(single.clone(), &problem), single);
    }
}
