//! Completion Tree Tests
//!
//! ## Test Scopes
//! - **Registration**: duplicate and unknown-parent handling.
//! - **Marking**: idempotency, unknown ids, transition reporting.
//! - **Completion**: no premature completion for any mark order, eventual completion.
//! - **Lifecycle**: rollback, eviction, retention.
//! - **Concurrency**: parallel marks report each transition exactly once.

#[cfg(test)]
mod tests {
    use crate::tracking::tree::CompletionTree;
    use crate::tracking::types::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Registers and seals one request with one document per entry in
    /// `page_counts`.
    fn build_tree(
        tree: &CompletionTree,
        page_counts: &[u32],
    ) -> (RequestId, Vec<(DocumentId, Vec<PageId>)>) {
        let request_id = RequestId::new();
        tree.register_request(&request_id).unwrap();

        let mut documents = Vec::new();
        for (i, count) in page_counts.iter().enumerate() {
            let document_id = DocumentId::new();
            tree.register_document(&request_id, &document_id, &format!("doc-{}.pdf", i))
                .unwrap();
            let pages: Vec<PageId> = (1..=*count)
                .map(|n| {
                    let page_id = PageId::new();
                    tree.register_page(&request_id, &document_id, &page_id, n)
                        .unwrap();
                    page_id
                })
                .collect();
            documents.push((document_id, pages));
        }
        tree.seal_request(&request_id).unwrap();

        (request_id, documents)
    }

    /// Heap's algorithm, enough for the small page counts used below.
    fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
        fn generate(k: usize, items: &mut Vec<usize>, out: &mut Vec<Vec<usize>>) {
            if k <= 1 {
                out.push(items.clone());
                return;
            }
            generate(k - 1, items, out);
            for i in 0..k - 1 {
                if k % 2 == 0 {
                    items.swap(i, k - 1);
                } else {
                    items.swap(0, k - 1);
                }
                generate(k - 1, items, out);
            }
        }

        let mut items = items.to_vec();
        let mut out = Vec::new();
        let len = items.len();
        generate(len, &mut items, &mut out);
        out
    }

    // ============================================================
    // TEST 1: Registration
    // ============================================================

    #[test]
    fn test_register_request_twice_is_duplicate() {
        let tree = CompletionTree::new();
        let request_id = RequestId::new();

        tree.register_request(&request_id).unwrap();
        let err = tree.register_request(&request_id).unwrap_err();

        assert!(matches!(
            err,
            TrackingError::DuplicateId {
                kind: NodeKind::Request,
                ..
            }
        ));
        assert_eq!(tree.request_count(), 1);
    }

    #[test]
    fn test_register_document_requires_request() {
        let tree = CompletionTree::new();

        let err = tree
            .register_document(&RequestId::new(), &DocumentId::new(), "a.pdf")
            .unwrap_err();

        assert!(matches!(
            err,
            TrackingError::UnknownParent {
                kind: NodeKind::Request,
                ..
            }
        ));
    }

    #[test]
    fn test_document_id_is_unique_across_requests() {
        let tree = CompletionTree::new();
        let first = RequestId::new();
        let second = RequestId::new();
        let document_id = DocumentId::new();
        tree.register_request(&first).unwrap();
        tree.register_request(&second).unwrap();

        tree.register_document(&first, &document_id, "a.pdf").unwrap();
        let err = tree
            .register_document(&second, &document_id, "b.pdf")
            .unwrap_err();

        assert!(matches!(
            err,
            TrackingError::DuplicateId {
                kind: NodeKind::Document,
                ..
            }
        ));
        assert!(tree.snapshot(&second).unwrap().documents.is_empty());
    }

    #[test]
    fn test_register_page_requires_document_in_same_request() {
        let tree = CompletionTree::new();
        let (request_id, _) = build_tree(&tree, &[1]);
        let (_, other_docs) = build_tree(&tree, &[1]);

        let err = tree
            .register_page(&request_id, &other_docs[0].0, &PageId::new(), 1)
            .unwrap_err();

        assert!(matches!(
            err,
            TrackingError::UnknownParent {
                kind: NodeKind::Document,
                ..
            }
        ));
    }

    #[test]
    fn test_register_page_twice_is_duplicate() {
        let tree = CompletionTree::new();
        let (request_id, docs) = build_tree(&tree, &[2]);
        let (document_id, pages) = &docs[0];

        let err = tree
            .register_page(&request_id, document_id, &pages[0], 3)
            .unwrap_err();

        assert!(matches!(
            err,
            TrackingError::DuplicateId {
                kind: NodeKind::Page,
                ..
            }
        ));
        assert_eq!(tree.get_status(&request_id).unwrap().total_pages, 2);
    }

    // ============================================================
    // TEST 2: Marking
    // ============================================================

    #[test]
    fn test_mark_unknown_ids_is_not_found_and_changes_nothing() {
        let tree = CompletionTree::new();
        let (request_id, docs) = build_tree(&tree, &[2]);
        let (document_id, pages) = &docs[0];
        let before = tree.snapshot(&request_id).unwrap();

        let unknown_request = tree.mark_page_finished(&RequestId::new(), document_id, &pages[0]);
        let unknown_document = tree.mark_page_finished(&request_id, &DocumentId::new(), &pages[0]);
        let unknown_page = tree.mark_page_finished(&request_id, document_id, &PageId::new());

        assert!(unknown_request.unwrap_err().is_not_found());
        assert!(matches!(
            unknown_document.unwrap_err(),
            TrackingError::NotFound {
                kind: NodeKind::Document,
                ..
            }
        ));
        assert!(matches!(
            unknown_page.unwrap_err(),
            TrackingError::NotFound {
                kind: NodeKind::Page,
                ..
            }
        ));
        assert_eq!(tree.snapshot(&request_id).unwrap(), before);
    }

    #[test]
    fn test_mark_twice_is_idempotent() {
        let tree = CompletionTree::new();
        let (request_id, docs) = build_tree(&tree, &[1]);
        let (document_id, pages) = &docs[0];

        let first = tree
            .mark_page_finished(&request_id, document_id, &pages[0])
            .unwrap();
        let after_first = tree.snapshot(&request_id).unwrap();
        let second = tree
            .mark_page_finished(&request_id, document_id, &pages[0])
            .unwrap();

        assert_eq!(
            first,
            MarkOutcome {
                page_changed: true,
                document_completed: true,
                request_completed: true,
            }
        );
        assert_eq!(second, MarkOutcome::default());
        assert_eq!(tree.snapshot(&request_id).unwrap(), after_first);
    }

    #[test]
    fn test_page_in_another_document_does_not_match() {
        let tree = CompletionTree::new();
        let (request_id, docs) = build_tree(&tree, &[1, 1]);

        let err = tree
            .mark_page_finished(&request_id, &docs[0].0, &docs[1].1[0])
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(!tree.is_request_finished(&request_id).unwrap());
    }

    // ============================================================
    // TEST 3: Completion semantics
    // ============================================================

    #[test]
    fn test_no_premature_completion_for_any_order() {
        for order in permutations(&[0, 1, 2, 3]) {
            let tree = CompletionTree::new();
            let (request_id, docs) = build_tree(&tree, &[4]);
            let (document_id, pages) = &docs[0];

            for (marked, idx) in order.iter().enumerate() {
                let outcome = tree
                    .mark_page_finished(&request_id, document_id, &pages[*idx])
                    .unwrap();
                let done = marked + 1 == pages.len();

                assert_eq!(outcome.document_completed, done, "order {:?}", order);
                assert_eq!(tree.is_request_finished(&request_id).unwrap(), done);
            }
        }
    }

    #[test]
    fn test_request_finishes_after_every_page_of_every_document() {
        let tree = CompletionTree::new();
        let (request_id, docs) = build_tree(&tree, &[2, 3, 1]);
        let mut document_completions = 0;
        let mut request_completions = 0;

        for (document_id, pages) in docs.iter().rev() {
            for page_id in pages {
                let outcome = tree
                    .mark_page_finished(&request_id, document_id, page_id)
                    .unwrap();
                document_completions += outcome.document_completed as usize;
                request_completions += outcome.request_completed as usize;
            }
        }

        assert!(tree.is_request_finished(&request_id).unwrap());
        assert_eq!(document_completions, 3);
        assert_eq!(request_completions, 1);
    }

    #[test]
    fn test_duplicate_marks_yield_same_state_as_single_marks() {
        let once = CompletionTree::new();
        let twice = CompletionTree::new();
        let (once_id, once_docs) = build_tree(&once, &[3]);
        let (twice_id, twice_docs) = build_tree(&twice, &[3]);

        for idx in [0, 2] {
            once.mark_page_finished(&once_id, &once_docs[0].0, &once_docs[0].1[idx])
                .unwrap();
            twice
                .mark_page_finished(&twice_id, &twice_docs[0].0, &twice_docs[0].1[idx])
                .unwrap();
            twice
                .mark_page_finished(&twice_id, &twice_docs[0].0, &twice_docs[0].1[idx])
                .unwrap();
        }

        let a = once.get_status(&once_id).unwrap();
        let b = twice.get_status(&twice_id).unwrap();
        assert_eq!(a.finished_pages, b.finished_pages);
        assert_eq!(a.finished, b.finished);
        assert_eq!(b.finished_pages, 2);
        assert!(!b.finished);
    }

    #[test]
    fn test_empty_request_is_vacuously_finished_once_sealed() {
        let tree = CompletionTree::new();
        let request_id = RequestId::new();
        tree.register_request(&request_id).unwrap();
        assert!(!tree.is_request_finished(&request_id).unwrap());

        assert!(tree.seal_request(&request_id).unwrap());

        assert!(tree.is_request_finished(&request_id).unwrap());
        assert!(tree.get_status(&request_id).unwrap().finished_at.is_some());
        assert!(!tree.seal_request(&request_id).unwrap());
    }

    #[test]
    fn test_unsealed_request_is_never_finished_or_expired() {
        // ARRANGE: a request mid-dispatch, with a document but no pages yet
        let tree = CompletionTree::new();
        let request_id = RequestId::new();
        let document_id = DocumentId::new();
        tree.register_request(&request_id).unwrap();
        tree.register_document(&request_id, &document_id, "scan.pdf")
            .unwrap();

        // ACT
        let finished = tree.is_request_finished(&request_id).unwrap();
        let due = tree.expired(now_ms() + 60_000, Duration::ZERO, None);

        // ASSERT: still open for the remaining registrations
        assert!(!finished);
        assert!(due.is_empty());
        assert!(!tree.get_status(&request_id).unwrap().sealed);
        tree.register_page(&request_id, &document_id, &PageId::new(), 1)
            .unwrap();
    }

    #[test]
    fn test_unsealed_request_expires_only_by_abandoned_ttl() {
        let tree = CompletionTree::new();
        let request_id = RequestId::new();
        tree.register_request(&request_id).unwrap();

        let due = tree.expired(
            now_ms() + 60_000,
            Duration::ZERO,
            Some(Duration::from_secs(30)),
        );

        assert_eq!(due, vec![request_id]);
    }

    #[test]
    fn test_pages_finished_before_seal_complete_on_seal() {
        let tree = CompletionTree::new();
        let request_id = RequestId::new();
        let document_id = DocumentId::new();
        let page_id = PageId::new();
        tree.register_request(&request_id).unwrap();
        tree.register_document(&request_id, &document_id, "a.txt")
            .unwrap();
        tree.register_page(&request_id, &document_id, &page_id, 1)
            .unwrap();

        let outcome = tree
            .mark_page_finished(&request_id, &document_id, &page_id)
            .unwrap();
        assert!(outcome.document_completed);
        assert!(!outcome.request_completed);

        assert!(tree.seal_request(&request_id).unwrap());
        assert!(tree.is_request_finished(&request_id).unwrap());
    }

    #[test]
    fn test_seal_unknown_or_evicted_request_is_not_found() {
        let tree = CompletionTree::new();
        let request_id = RequestId::new();
        tree.register_request(&request_id).unwrap();
        tree.evict(&request_id).unwrap();

        assert!(tree.seal_request(&request_id).unwrap_err().is_not_found());
        assert!(tree
            .seal_request(&RequestId::new())
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn test_is_request_finished_unknown() {
        let tree = CompletionTree::new();

        assert!(tree
            .is_request_finished(&RequestId::new())
            .unwrap_err()
            .is_not_found());
    }

    // ============================================================
    // TEST 4: Snapshot and status
    // ============================================================

    #[test]
    fn test_snapshot_orders_documents_and_pages() {
        let tree = CompletionTree::new();
        let (request_id, docs) = build_tree(&tree, &[3, 2]);
        tree.mark_page_finished(&request_id, &docs[0].0, &docs[0].1[1])
            .unwrap();

        let snapshot = tree.snapshot(&request_id).unwrap();

        assert_eq!(snapshot.documents.len(), 2);
        assert_eq!(snapshot.documents[0].id, docs[0].0);
        assert_eq!(snapshot.documents[1].filename, "doc-1.pdf");
        let numbers: Vec<u32> = snapshot.documents[0]
            .pages
            .iter()
            .map(|p| p.page_number)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(snapshot.documents[0].pages[1].finished);
        assert!(!snapshot.documents[0].finished);
    }

    #[test]
    fn test_status_counts_pages_per_document() {
        let tree = CompletionTree::new();
        let (request_id, docs) = build_tree(&tree, &[2, 1]);
        tree.mark_page_finished(&request_id, &docs[1].0, &docs[1].1[0])
            .unwrap();
        tree.record_failed_document(&request_id, "broken.pdf", "corrupt input")
            .unwrap();

        let status = tree.get_status(&request_id).unwrap();

        assert_eq!(status.total_pages, 3);
        assert_eq!(status.finished_pages, 1);
        assert!(!status.finished);
        assert!(!status.documents[0].finished);
        assert!(status.documents[1].finished);
        assert_eq!(status.failed_documents.len(), 1);
        assert_eq!(status.failed_documents[0].filename, "broken.pdf");
    }

    // ============================================================
    // TEST 5: Rollback, eviction and retention
    // ============================================================

    #[test]
    fn test_remove_document_frees_ids() {
        let tree = CompletionTree::new();
        let (request_id, docs) = build_tree(&tree, &[2]);
        let (document_id, pages) = &docs[0];

        tree.remove_document(&request_id, document_id).unwrap();

        assert!(tree.snapshot(&request_id).unwrap().documents.is_empty());
        assert!(tree
            .mark_page_finished(&request_id, document_id, &pages[0])
            .unwrap_err()
            .is_not_found());
        tree.register_document(&request_id, document_id, "retry.pdf")
            .unwrap();
    }

    #[test]
    fn test_evict_unfinished_request_ignores_later_notifications() {
        let tree = CompletionTree::new();
        let (request_id, docs) = build_tree(&tree, &[2]);
        let (document_id, pages) = &docs[0];

        tree.evict(&request_id).unwrap();

        assert_eq!(tree.request_count(), 0);
        assert!(tree
            .mark_page_finished(&request_id, document_id, &pages[0])
            .unwrap_err()
            .is_not_found());
        assert!(tree.evict(&request_id).unwrap_err().is_not_found());
        assert!(matches!(
            tree.register_document(&request_id, &DocumentId::new(), "late.pdf"),
            Err(TrackingError::UnknownParent { .. })
        ));
    }

    #[test]
    fn test_expired_respects_retention_and_ttl() {
        let tree = CompletionTree::new();
        let (finished_id, finished_docs) = build_tree(&tree, &[1]);
        let (pending_id, _) = build_tree(&tree, &[1]);
        tree.mark_page_finished(&finished_id, &finished_docs[0].0, &finished_docs[0].1[0])
            .unwrap();

        let now = now_ms();
        let later = now + 60_000;

        assert!(tree.expired(now, Duration::from_secs(30), None).is_empty());

        let due = tree.expired(later, Duration::from_secs(30), None);
        assert_eq!(due, vec![finished_id.clone()]);

        let mut due = tree.expired(later, Duration::from_secs(30), Some(Duration::from_secs(10)));
        due.sort_by(|a, b| a.0.cmp(&b.0));
        let mut expected = vec![finished_id, pending_id];
        expected.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(due, expected);
    }

    // ============================================================
    // TEST 6: Concurrency
    // ============================================================

    #[test]
    fn test_parallel_marks_complete_request_exactly_once() {
        let tree = CompletionTree::new();
        let (request_id, docs) = build_tree(&tree, &[16, 16, 16, 16]);
        let document_completions = Arc::new(AtomicUsize::new(0));
        let request_completions = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for worker in 0..8 {
                let tree = tree.clone();
                let docs = &docs;
                let request_id = &request_id;
                let document_completions = document_completions.clone();
                let request_completions = request_completions.clone();
                scope.spawn(move || {
                    // Every worker marks every page, simulating redelivery.
                    for (document_id, pages) in docs.iter() {
                        for i in 0..pages.len() {
                            let page_id = &pages[(i + worker) % pages.len()];
                            let outcome = tree
                                .mark_page_finished(request_id, document_id, page_id)
                                .unwrap();
                            if outcome.document_completed {
                                document_completions.fetch_add(1, Ordering::SeqCst);
                            }
                            if outcome.request_completed {
                                request_completions.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                });
            }
        });

        assert!(tree.is_request_finished(&request_id).unwrap());
        assert_eq!(document_completions.load(Ordering::SeqCst), 4);
        assert_eq!(request_completions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_id_types_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
        assert_ne!(DocumentId::new(), DocumentId::new());
        assert_ne!(PageId::new(), PageId::new());
    }
}
