//! Assessment-level recommendation.

use serde::Serialize;

use super::Summary;

/// One of the fixed assessment-level recommendation texts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverallRecommendation {
    pub id: u16,
    pub text: &'static str,
}

const NO_DATA: OverallRecommendation = OverallRecommendation {
    id: 100,
    text: "None of the tests in this assessment had the necessary data available to run to completion.  Make sure the testing environment is configured correctly, and then run the assessment again.",
};

/// Bands of the pass ratio, by exclusive upper bound. The last band
/// includes 1.0.
const BANDS: [(f64, OverallRecommendation); 4] = [
    (
        0.2,
        OverallRecommendation {
            id: 101,
            text: "Based on the tests performed under this assessment, data access of the defined database environments requires significant improvement across a number of areas. Refer to the recommendations of the individual tests to learn how you can address problems within your environment, focusing on severe issues first. Continue running repeats of this assessment with every issue you address to track improvement.",
        },
    ),
    (
        0.5,
        OverallRecommendation {
            id: 102,
            text: "Based on the tests performed under this assessment, data access of the defined database environments requires improvement. Refer to the recommendations of the individual tests to learn how you can address problems within your environment and what you should focus upon first. Once you have begun addressing these problems you should also consider scheduling this assessment as an audit task to continuously assess these environments and track improvement.",
        },
    ),
    (
        0.8,
        OverallRecommendation {
            id: 103,
            text: "Based on the tests performed under this assessment, data access of the defined database environments is nearing best practices. Refer to the recommendations of the individual tests to learn how you can achieve best-practice status. You should also consider scheduling this assessment as an audit task to continuously assess these environments and track improvement.",
        },
    ),
    (
        f64::INFINITY,
        OverallRecommendation {
            id: 104,
            text: "Based on the tests performed under this assessment, data access of the defined database environments conform to best practices. You have a controlled environment in terms of the tests performed. You should consider scheduling this assessment as an audit task to continuously assess these environments.",
        },
    ),
];

impl OverallRecommendation {
    /// Picks the text for a run from its pass ratio.
    pub fn for_summary(summary: &Summary) -> Self {
        let Some(ratio) = summary.pass_ratio() else {
            return NO_DATA;
        };
        BANDS
            .iter()
            .find(|(upper, _)| ratio < *upper)
            .map_or(NO_DATA, |(_, band)| *band)
    }
}
