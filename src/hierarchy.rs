//! Threaded post hierarchy reconstruction with like aggregation.
//!
//! A thread's posts are stored flat; every render of the thread detail
//! rebuilds the reply forest from scratch. Nothing here touches the
//! database: the caller fetches the posts (creation order ascending) and
//! the like records, and `build` is a pure transformation over them.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::post::{Post, PostLike, PostState};

/// Pre-aggregated like records for one thread's posts.
///
/// Per-post counts plus the exact (post, user) pairs, so both
/// `like_count` and `user_has_liked` are O(1) lookups during the build.
#[derive(Debug, Default)]
pub struct LikeIndex {
    counts: HashMap<i64, i64>,
    pairs: HashSet<(i64, i64)>,
}

impl LikeIndex {
    pub fn new(records: impl IntoIterator<Item = (i64, i64)>) -> Self {
        let mut index = LikeIndex::default();
        for (post_id, user_id) in records {
            *index.counts.entry(post_id).or_insert(0) += 1;
            index.pairs.insert((post_id, user_id));
        }
        index
    }

    pub fn from_records(records: &[PostLike]) -> Self {
        Self::new(records.iter().map(|l| (l.post_id, l.user_id)))
    }

    pub fn count(&self, post_id: i64) -> i64 {
        self.counts.get(&post_id).copied().unwrap_or(0)
    }

    pub fn user_has_liked(&self, post_id: i64, user_id: i64) -> bool {
        self.pairs.contains(&(post_id, user_id))
    }
}

/// Derived read model: a post annotated with like data and its replies.
/// Never persisted; rebuilt on every thread-detail read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostView {
    pub id: i64,
    pub thread_id: i64,
    pub author_id: i64,
    pub author_username: String,
    pub parent_post_id: Option<i64>,

    /// Display body: the placeholder for deleted posts.
    pub content: String,

    #[serde(flatten)]
    pub state: PostState,

    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,

    pub like_count: i64,
    pub user_has_liked: bool,

    /// Child replies, in creation order.
    pub replies: Vec<PostView>,
}

impl PostView {
    fn from_post(post: Post, likes: &LikeIndex, current_user_id: Option<i64>) -> Self {
        let content = post.visible_content().to_string();
        let state = post.state();
        let like_count = likes.count(post.id);
        let user_has_liked = match current_user_id {
            Some(user_id) => likes.user_has_liked(post.id, user_id),
            // Anonymous viewers never see a like as theirs.
            None => false,
        };

        PostView {
            id: post.id,
            thread_id: post.thread_id,
            author_id: post.author_id,
            author_username: post.author_username,
            parent_post_id: post.parent_post_id,
            content,
            state,
            created_at: post.created_at,
            edited_at: post.edited_at,
            like_count,
            user_has_liked,
            replies: Vec::new(),
        }
    }
}

/// Builds the reply forest for one thread.
///
/// `posts` must be ordered by creation time ascending; root order and
/// sibling order in the output follow that input order. Parent references
/// may point forwards or backwards within the input.
///
/// A post whose parent id is not present in the input set is dropped from
/// the output entirely, along with anything nested beneath it. Assembly is
/// iterative and marks visited nodes, so a pathological parent cycle (or a
/// self-referential post) cannot loop or overflow the stack; nodes on a
/// cycle are unreachable from any root and fall out like orphans.
pub fn build(posts: Vec<Post>, likes: &LikeIndex, current_user_id: Option<i64>) -> Vec<PostView> {
    let index: HashMap<i64, usize> = posts
        .iter()
        .enumerate()
        .map(|(pos, post)| (post.id, pos))
        .collect();

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); posts.len()];
    let mut roots: Vec<usize> = Vec::new();

    for (pos, post) in posts.iter().enumerate() {
        match post.parent_post_id {
            None => roots.push(pos),
            Some(parent_id) => match index.get(&parent_id) {
                Some(&parent_pos) => children[parent_pos].push(pos),
                None => {
                    tracing::debug!(
                        post_id = post.id,
                        parent_id,
                        "dropping reply with dangling parent reference"
                    );
                }
            },
        }
    }

    let mut nodes: Vec<Option<PostView>> = posts
        .into_iter()
        .map(|post| Some(PostView::from_post(post, likes, current_user_id)))
        .collect();

    // Pre-order walk from the roots. Reversed, it yields every node after
    // all of its descendants, so replies can be attached bottom-up without
    // recursion.
    let mut order: Vec<usize> = Vec::with_capacity(nodes.len());
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    let mut seen = vec![false; nodes.len()];
    while let Some(pos) = stack.pop() {
        if seen[pos] {
            continue;
        }
        seen[pos] = true;
        order.push(pos);
        stack.extend(children[pos].iter().rev());
    }

    for &pos in order.iter().rev() {
        if children[pos].is_empty() {
            continue;
        }
        let replies: Vec<PostView> = children[pos]
            .iter()
            .filter_map(|&child| nodes[child].take())
            .collect();
        if let Some(node) = nodes[pos].as_mut() {
            node.replies = replies;
        }
    }

    roots
        .into_iter()
        .filter_map(|pos| nodes[pos].take())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(id: i64, parent: Option<i64>) -> Post {
        // Creation timestamps follow the id so inputs built in id order
        // are creation-ordered, as the query guarantees in production.
        Post {
            id,
            thread_id: 7,
            author_id: 100 + id,
            author_username: format!("user{id}"),
            parent_post_id: parent,
            content: format!("post {id}"),
            created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
            edited_at: None,
            deleted_at: None,
            delete_reason: None,
        }
    }

    fn ids(forest: &[PostView]) -> Vec<i64> {
        forest.iter().map(|v| v.id).collect()
    }

    #[test]
    fn empty_input_yields_empty_forest() {
        let forest = build(Vec::new(), &LikeIndex::default(), Some(1));
        assert!(forest.is_empty());
    }

    #[test]
    fn roots_keep_creation_order() {
        let posts = vec![post(1, None), post(2, None), post(3, None)];
        let forest = build(posts, &LikeIndex::default(), None);
        assert_eq!(ids(&forest), vec![1, 2, 3]);
        assert!(forest.iter().all(|v| v.replies.is_empty()));
    }

    #[test]
    fn replies_nest_under_parent_in_creation_order() {
        let posts = vec![
            post(1, None),
            post(2, Some(1)),
            post(3, Some(1)),
            post(4, Some(2)),
        ];
        let forest = build(posts, &LikeIndex::default(), None);

        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(ids(&forest[0].replies), vec![2, 3]);
        assert_eq!(ids(&forest[0].replies[0].replies), vec![4]);
    }

    #[test]
    fn forward_parent_reference_still_attaches() {
        // Input deliberately out of natural nesting order: the child
        // appears before its parent.
        let posts = vec![post(2, Some(1)), post(1, None)];
        let forest = build(posts, &LikeIndex::default(), None);

        assert_eq!(ids(&forest), vec![1]);
        assert_eq!(ids(&forest[0].replies), vec![2]);
    }

    #[test]
    fn like_counts_and_viewer_flag() {
        let posts = vec![post(1, None), post(2, Some(1)), post(3, Some(2)), post(4, Some(99))];
        let likes = LikeIndex::new(vec![(1, 501), (1, 502), (2, 501)]);

        let forest = build(posts, &likes, Some(501));

        assert_eq!(forest.len(), 1);
        let root = &forest[0];
        assert_eq!(root.id, 1);
        assert_eq!(root.like_count, 2);
        assert!(root.user_has_liked);

        let reply = &root.replies[0];
        assert_eq!(reply.id, 2);
        assert_eq!(reply.like_count, 1);
        assert!(reply.user_has_liked);

        let nested = &reply.replies[0];
        assert_eq!(nested.id, 3);
        assert_eq!(nested.like_count, 0);
        assert!(!nested.user_has_liked);

        // Post 4 references a parent outside the set and is absent.
        fn contains(forest: &[PostView], id: i64) -> bool {
            forest
                .iter()
                .any(|v| v.id == id || contains(&v.replies, id))
        }
        assert!(!contains(&forest, 4));
    }

    #[test]
    fn anonymous_viewer_never_has_liked() {
        let posts = vec![post(1, None)];
        let likes = LikeIndex::new(vec![(1, 501)]);
        let forest = build(posts, &likes, None);
        assert_eq!(forest[0].like_count, 1);
        assert!(!forest[0].user_has_liked);
    }

    #[test]
    fn orphan_subtree_is_dropped_not_promoted() {
        // 5 replies to the orphan 4; both must vanish, not become roots.
        let posts = vec![post(1, None), post(4, Some(99)), post(5, Some(4))];
        let forest = build(posts, &LikeIndex::default(), None);
        assert_eq!(ids(&forest), vec![1]);
    }

    #[test]
    fn parent_cycle_terminates_and_is_dropped() {
        let posts = vec![post(1, None), post(2, Some(3)), post(3, Some(2))];
        let forest = build(posts, &LikeIndex::default(), None);
        assert_eq!(ids(&forest), vec![1]);
    }

    #[test]
    fn self_referential_post_is_dropped() {
        let posts = vec![post(1, None), post(2, Some(2))];
        let forest = build(posts, &LikeIndex::default(), None);
        assert_eq!(ids(&forest), vec![1]);
    }

    #[test]
    fn build_is_idempotent() {
        let make = || {
            vec![
                post(1, None),
                post(2, Some(1)),
                post(3, None),
                post(4, Some(2)),
                post(5, Some(1)),
            ]
        };
        let likes = LikeIndex::new(vec![(1, 501), (2, 502), (2, 503)]);

        let first = build(make(), &likes, Some(502));
        let second = build(make(), &likes, Some(502));
        assert_eq!(first, second);
    }

    #[test]
    fn deleted_post_is_marked_and_masked_in_the_tree() {
        let mut removed = post(2, Some(1));
        removed.deleted_at = Some(Utc::now());
        removed.delete_reason = Some("removed by author".to_string());

        let forest = build(vec![post(1, None), removed], &LikeIndex::default(), None);
        let reply = &forest[0].replies[0];
        assert_eq!(
            reply.state,
            PostState::Deleted {
                reason: "removed by author".to_string()
            }
        );
        assert_eq!(reply.content, crate::models::post::DELETED_PLACEHOLDER);
    }
}
