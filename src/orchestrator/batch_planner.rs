//! 批次规划器 - 编排层
//!
//! 把 `WorkloadSpec` 拆成有序的 `BatchDescriptor` 序列：
//!
//! - 分类按声明顺序，分类内按题目范围顺序
//! - 每 `batch_size` 个分类为一组，组号从 1 开始
//! - `max_questions` 为空时按 `questions_per_batch` 生成开放式批次，
//!   直到调用方通过 `mark_exhausted` 告知分类在某个偏移量处已经抓完
//! - 抓完只截断该偏移量之后的批次，之前的批次照常生成

use std::collections::HashMap;

use crate::models::loaders::dedup_preserving_order;
use crate::models::{BatchDescriptor, WorkloadSpec};

/// 批次规划器（惰性迭代器）
#[derive(Debug, Clone)]
pub struct BatchPlanner {
    /// (分类, 组号)，已去掉 `resume_from_group` 之前的组
    entries: Vec<(String, usize)>,
    max_questions: Option<usize>,
    questions_per_batch: usize,
    cursor: usize,
    chunk: usize,
    next_id: u64,
    /// 分类 → 报告抓完的批次偏移量，超过它的批次不再生成
    exhausted: HashMap<String, usize>,
}

impl BatchPlanner {
    pub fn new(workload: &WorkloadSpec, categories: Vec<String>) -> Self {
        let batch_size = workload.batch_size.max(1);
        let first_group = workload.resume_from_group.unwrap_or(1);

        let entries = dedup_preserving_order(categories)
            .into_iter()
            .enumerate()
            .map(|(idx, category)| (category, idx / batch_size + 1))
            .filter(|(_, group)| *group >= first_group)
            .collect();

        Self {
            entries,
            max_questions: workload.max_questions,
            questions_per_batch: workload.questions_per_batch.max(1),
            cursor: 0,
            chunk: 0,
            next_id: 1,
            exhausted: HashMap::new(),
        }
    }

    /// 一次性生成全部批次
    ///
    /// 开放式分类只生成第一个批次（后续批次依赖运行时的抓完反馈）。
    pub fn plan(workload: &WorkloadSpec, categories: Vec<String>) -> Vec<BatchDescriptor> {
        let mut planner = Self::new(workload, categories);
        let mut batches = Vec::new();
        while let Some(batch) = planner.next() {
            if batch.question_quota.is_none() {
                planner.mark_exhausted(&batch.category, batch.offset);
            }
            batches.push(batch);
        }
        batches
    }

    /// 标记分类在 `offset` 处已经没有更多题目，之后不再生成偏移量更大的批次
    ///
    /// 多次标记取最小的偏移量。
    pub fn mark_exhausted(&mut self, category: &str, offset: usize) {
        self.exhausted
            .entry(category.to_string())
            .and_modify(|limit| *limit = (*limit).min(offset))
            .or_insert(offset);
    }

    /// 参与规划的 (分类, 组号)
    pub fn entries(&self) -> &[(String, usize)] {
        &self.entries
    }

    /// 总组数（含被跳过的组）
    pub fn group_count(&self) -> usize {
        self.entries.last().map(|(_, group)| *group).unwrap_or(0)
    }

    fn advance_category(&mut self) {
        self.cursor += 1;
        self.chunk = 0;
    }
}

impl Iterator for BatchPlanner {
    type Item = BatchDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (category, group) = self.entries.get(self.cursor)?.clone();

            let offset = self.chunk * self.questions_per_batch;
            if self.exhausted.get(&category).is_some_and(|limit| offset > *limit) {
                self.advance_category();
                continue;
            }

            let quota = match self.max_questions {
                Some(max) if offset >= max => {
                    self.advance_category();
                    continue;
                }
                Some(max) => Some(self.questions_per_batch.min(max - offset)),
                None => None,
            };

            self.chunk += 1;
            let batch_id = self.next_id;
            self.next_id += 1;

            return Some(BatchDescriptor {
                batch_id,
                category,
                group,
                offset,
                question_quota: quota,
                attempt_count: 0,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategorySelection;

    fn workload(max: Option<usize>, per_batch: usize, batch_size: usize) -> WorkloadSpec {
        WorkloadSpec {
            categories: CategorySelection::All,
            max_questions: max,
            batch_size,
            parallel_jobs: 2,
            questions_per_batch: per_batch,
            resume_from_group: None,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn splits_quota_into_two_batches() {
        let batches = BatchPlanner::plan(&workload(Some(10), 5, 1), names(&["movies"]));
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.question_quota == Some(5)));
        assert_eq!(batches[0].offset, 0);
        assert_eq!(batches[1].offset, 5);
        assert_eq!(batches[0].batch_id, 1);
        assert_eq!(batches[1].batch_id, 2);
    }

    #[test]
    fn last_chunk_holds_the_remainder() {
        let batches = BatchPlanner::plan(&workload(Some(12), 5, 1), names(&["music"]));
        let quotas: Vec<_> = batches.iter().map(|b| b.question_quota).collect();
        assert_eq!(quotas, vec![Some(5), Some(5), Some(2)]);
    }

    #[test]
    fn plan_is_deterministic() {
        let w = workload(Some(7), 3, 2);
        let cats = names(&["b", "a", "c"]);
        assert_eq!(
            BatchPlanner::plan(&w, cats.clone()),
            BatchPlanner::plan(&w, cats)
        );
    }

    #[test]
    fn keeps_declaration_order_and_drops_duplicates() {
        let batches = BatchPlanner::plan(
            &workload(Some(2), 5, 1),
            names(&["sports", "movies", "sports"]),
        );
        let cats: Vec<_> = batches.iter().map(|b| b.category.as_str()).collect();
        assert_eq!(cats, vec!["sports", "movies"]);
    }

    #[test]
    fn groups_and_resume_from_group() {
        let mut w = workload(Some(1), 1, 2);
        let cats = names(&["a", "b", "c", "d", "e"]);

        let groups: Vec<_> = BatchPlanner::plan(&w, cats.clone())
            .iter()
            .map(|b| b.group)
            .collect();
        assert_eq!(groups, vec![1, 1, 2, 2, 3]);

        w.resume_from_group = Some(2);
        let batches = BatchPlanner::plan(&w, cats);
        let cats: Vec<_> = batches.iter().map(|b| b.category.as_str()).collect();
        assert_eq!(cats, vec!["c", "d", "e"]);
        assert_eq!(batches[0].batch_id, 1);
    }

    #[test]
    fn open_ended_runs_until_exhausted() {
        let mut planner = BatchPlanner::new(&workload(None, 4, 1), names(&["movies", "music"]));

        let first = planner.next().unwrap();
        let second = planner.next().unwrap();
        assert_eq!((first.offset, first.question_quota), (0, None));
        assert_eq!((second.category.as_str(), second.offset), ("movies", 4));

        planner.mark_exhausted("movies", 4);
        let third = planner.next().unwrap();
        assert_eq!((third.category.as_str(), third.offset), ("music", 0));

        planner.mark_exhausted("music", 0);
        assert!(planner.next().is_none());
    }

    #[test]
    fn exhaustion_only_cuts_later_chunks() {
        let w = workload(Some(25), 5, 1);
        let mut planner = BatchPlanner::new(&w, names(&["movies", "music"]));
        planner.mark_exhausted("movies", 5);

        let offsets: Vec<_> = planner
            .by_ref()
            .map(|b| (b.category, b.offset))
            .collect();
        assert_eq!(offsets[0], ("movies".to_string(), 0));
        assert_eq!(offsets[1], ("movies".to_string(), 5));
        assert_eq!(offsets[2], ("music".to_string(), 0));
        assert_eq!(offsets.len(), 2 + 5);
    }

    #[test]
    fn eager_plan_yields_first_open_ended_chunk_only() {
        let batches = BatchPlanner::plan(&workload(None, 4, 1), names(&["movies", "music"]));
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.offset == 0));
    }
}
