use std::cmp::Ordering;

use ndarray::ArrayView1;
use serde::Serialize;
use utoipa::ToSchema;

use crate::index::GalleryIndex;

/// 顶部结果的分数超过该阈值时标记为精确匹配
pub const EXACT_MATCH_THRESHOLD: f32 = 0.99;

/// 单条搜索结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SearchResult {
    /// 余弦相似度，范围 `[-1, 1]`
    pub score: f32,
    /// 图库中的图片路径
    pub path: String,
    /// 是否为精确匹配（仅第一名可能为 true）
    pub exact: bool,
}

/// 在索引中搜索与查询向量最相似的 top_k 张图片
///
/// 查询向量必须和索引向量经过同一套归一化流程，此处不做防御性归一化；
/// 两侧都是单位向量时，点积即余弦相似度。
///
/// 分数相同的行按原始行序升序排列，结果在同一份索引上可复现。
/// `top_k` 超过索引大小时返回全部行；空索引返回空结果而不是错误。
pub fn search(index: &GalleryIndex, query: ArrayView1<f32>, top_k: usize) -> Vec<SearchResult> {
    if index.is_empty() || top_k == 0 {
        return vec![];
    }
    assert_eq!(query.len(), index.dim(), "query dimension mismatch");

    let scores = index.feats.dot(&query);

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| match scores[b].total_cmp(&scores[a]) {
        Ordering::Equal => a.cmp(&b),
        other => other,
    });
    order.truncate(top_k);

    order
        .into_iter()
        .enumerate()
        .map(|(rank, i)| SearchResult {
            score: scores[i],
            path: index.paths[i].clone(),
            exact: rank == 0 && scores[i] > EXACT_MATCH_THRESHOLD,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn sample_index() -> GalleryIndex {
        GalleryIndex {
            feats: array![
                [1.0f32, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
                [0.6, 0.8, 0.0],
            ],
            paths: (0..4).map(|i| format!("{i}.jpg")).collect(),
        }
    }

    #[test]
    fn identical_vector_ranks_first_as_exact() {
        let index = sample_index();
        let query = index.feats.row(3).to_owned();

        let results = search(&index, query.view(), 3);

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].path, "3.jpg");
        assert!((results[0].score - 1.0).abs() < 1e-5);
        assert!(results[0].exact);
        assert!(!results[1].exact);
        assert!(results[0].score >= results[1].score);
        assert!(results[1].score >= results[2].score);
    }

    #[test]
    fn top_k_is_bounded_by_index_size() {
        let index = sample_index();
        let query = array![1.0f32, 0.0, 0.0];

        assert_eq!(search(&index, query.view(), 2).len(), 2);
        assert_eq!(search(&index, query.view(), 100).len(), 4);
    }

    #[test]
    fn scores_are_non_increasing() {
        let index = sample_index();
        let query = array![0.6f32, 0.8, 0.0];

        let results = search(&index, query.view(), 4);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn ties_keep_original_row_order() {
        let index = GalleryIndex {
            feats: array![[0.0f32, 1.0], [1.0, 0.0], [1.0, 0.0], [1.0, 0.0]],
            paths: (0..4).map(|i| format!("{i}.jpg")).collect(),
        };
        let query = array![1.0f32, 0.0];

        let results = search(&index, query.view(), 4);
        let paths: Vec<_> = results.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, ["1.jpg", "2.jpg", "3.jpg", "0.jpg"]);
    }

    #[test]
    fn empty_index_yields_empty_results() {
        let index = GalleryIndex {
            feats: ndarray::Array2::zeros((0, 3)),
            paths: vec![],
        };
        let query = array![1.0f32, 0.0, 0.0];
        assert!(search(&index, query.view(), 5).is_empty());
    }

    #[test]
    fn cosine_matches_mathematical_definition() {
        let v1 = array![1.0f32, 2.0, 3.0];
        let v2 = array![-2.0f32, 0.5, 1.0];

        let mut n1 = v1.clone();
        let mut n2 = v2.clone();
        crate::extract::normalize(&mut n1);
        crate::extract::normalize(&mut n2);

        let index = GalleryIndex {
            feats: n1.insert_axis(ndarray::Axis(0)),
            paths: vec!["0.jpg".into()],
        };
        let results = search(&index, n2.view(), 1);

        let expected = v1.dot(&v2) / (v1.dot(&v1).sqrt() * v2.dot(&v2).sqrt());
        assert!((results[0].score - expected).abs() < 1e-4);
    }

    #[test]
    fn random_index_respects_bound_and_order() {
        use rand::Rng;

        let mut rng = rand::rng();
        let n = 37;
        let dim = 16;

        let mut feats = ndarray::Array2::<f32>::zeros((n, dim));
        for mut row in feats.rows_mut() {
            for v in row.iter_mut() {
                *v = rng.random_range(-1.0..1.0);
            }
            let norm = row.dot(&row).sqrt();
            row.mapv_inplace(|x| x / (norm + 1e-6));
        }
        let index = GalleryIndex {
            feats,
            paths: (0..n).map(|i| format!("{i}.jpg")).collect(),
        };

        let mut query = ndarray::Array1::<f32>::zeros(dim);
        for v in query.iter_mut() {
            *v = rng.random_range(-1.0..1.0);
        }
        crate::extract::normalize(&mut query);

        for top_k in [1, 5, n, n + 10] {
            let results = search(&index, query.view(), top_k);
            assert_eq!(results.len(), top_k.min(n));
            for pair in results.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }
    }

    #[test]
    fn low_score_top_result_is_not_exact() {
        let index = sample_index();
        let query = array![0.7f32, 0.7, 0.14];

        let results = search(&index, query.view(), 1);
        assert!(!results[0].exact);
    }
}
