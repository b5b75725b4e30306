//! Works: the repository over both stores and the catalog built on it
//!
//! The relational link row owns a work's status. Reads join document and
//! link; a document without a link (or the reverse) is treated as absent.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{log_upstream, Core};
use crate::auth::ParticipantRole;
use crate::ledger::{bounded, ledger_work_id, PublishRequest};
use crate::library::{
    parse_keywords, visibility, AuthorInfo, NewWork, Participant, TransitionPlan, Work, WorkLink,
    WorkStatus, WorkTransition,
};
use crate::types::{LibraryError, Result};

/// Conditional writes retried before giving up on a contended transition
const MAX_TRANSITION_ATTEMPTS: usize = 3;

// ============================================================================
// Repository
// ============================================================================

#[derive(Clone)]
pub struct WorkRepository {
    core: Arc<Core>,
}

impl WorkRepository {
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self { core }
    }

    /// Store the document, then the link carrying its status
    pub async fn create(&self, work: &Work) -> Result<WorkLink> {
        self.core
            .stores
            .works
            .put_work(work)
            .await
            .map_err(|e| log_upstream("create_work", &work.id, e))?;

        let link = WorkLink::for_work(work);
        self.core
            .stores
            .linkage
            .create_work_link(&link)
            .await
            .map_err(|e| log_upstream("create_work", &work.id, e))?;
        Ok(link)
    }

    /// Joined work with its link; status taken from the link
    pub async fn get(&self, work_id: &str) -> Result<(Work, WorkLink)> {
        let not_found = || LibraryError::NotFound(format!("work {work_id}"));

        let link = self
            .core
            .stores
            .linkage
            .work_link(work_id)
            .await
            .map_err(|e| log_upstream("get_work", work_id, e))?
            .ok_or_else(not_found)?;
        let mut work = self
            .core
            .stores
            .works
            .works_by_ids(&[work_id.to_string()])
            .await
            .map_err(|e| log_upstream("get_work", work_id, e))?
            .into_iter()
            .next()
            .ok_or_else(not_found)?;

        work.status = link.status;
        Ok((work, link))
    }

    /// Attach documents to links, keeping link order and dropping orphans
    pub async fn join(&self, links: Vec<WorkLink>) -> Result<Vec<(Work, WorkLink)>> {
        if links.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = links.iter().map(|l| l.work_id.clone()).collect();
        let mut documents: HashMap<String, Work> = self
            .core
            .stores
            .works
            .works_by_ids(&ids)
            .await
            .map_err(|e| log_upstream("join_works", &format!("{} works", ids.len()), e))?
            .into_iter()
            .map(|w| (w.id.clone(), w))
            .collect();

        let mut joined = Vec::with_capacity(links.len());
        for link in links {
            match documents.remove(&link.work_id) {
                Some(mut work) => {
                    work.status = link.status;
                    joined.push((work, link));
                }
                None => debug!("Work {} has a link but no document", link.work_id),
            }
        }
        Ok(joined)
    }

    /// Attach links to documents, dropping documents without one
    pub async fn attach_links(&self, works: Vec<Work>) -> Result<Vec<(Work, WorkLink)>> {
        let mut joined = Vec::with_capacity(works.len());
        for mut work in works {
            let link = self
                .core
                .stores
                .linkage
                .work_link(&work.id)
                .await
                .map_err(|e| log_upstream("attach_links", &work.id, e))?;
            match link {
                Some(link) => {
                    work.status = link.status;
                    joined.push((work, link));
                }
                None => debug!("Work {} has a document but no link", work.id),
            }
        }
        Ok(joined)
    }

    /// Move a work along the state machine with a conditional write.
    ///
    /// Returns the status the work ends up in. Repeating a transition that
    /// already happened is a no-op; a review-driven transition that no longer
    /// applies is logged and ignored.
    pub async fn transition(
        &self,
        work_id: &str,
        transition: WorkTransition,
    ) -> Result<WorkStatus> {
        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            let link = self
                .core
                .stores
                .linkage
                .work_link(work_id)
                .await?
                .ok_or_else(|| LibraryError::NotFound(format!("work {work_id}")))?;

            match transition.plan(link.status)? {
                TransitionPlan::Unchanged => {
                    debug!(
                        "{}: work {} already {}",
                        transition.name(),
                        work_id,
                        link.status
                    );
                    return Ok(link.status);
                }
                TransitionPlan::Ignored => {
                    warn!(
                        "{}: ignored for work {} in status {}",
                        transition.name(),
                        work_id,
                        link.status
                    );
                    return Ok(link.status);
                }
                TransitionPlan::Apply { from, to } => {
                    let changed = self
                        .core
                        .stores
                        .linkage
                        .transition_work_status(work_id, from, to)
                        .await
                        .map_err(|e| log_upstream(transition.name(), work_id, e))?;
                    if changed {
                        info!("Work {} moved {} -> {}", work_id, from, to);
                        self.sync_document(work_id, to).await;
                        return Ok(to);
                    }
                    debug!("{}: work {} changed underneath, retrying", transition.name(), work_id);
                }
            }
        }

        Err(LibraryError::Conflict(format!(
            "work {work_id} status kept changing during {}",
            transition.name()
        )))
    }

    /// Bring the document's status copy in line with the link
    async fn sync_document(&self, work_id: &str, status: WorkStatus) {
        let result = if status == WorkStatus::Open {
            self.release(work_id).await
        } else {
            self.core.stores.works.set_work_status(work_id, status).await
        };
        if let Err(e) = result {
            warn!("Work {} document status not synced to {}: {}", work_id, status, e);
        }
    }

    async fn release(&self, work_id: &str) -> Result<()> {
        let documents = self
            .core
            .stores
            .works
            .works_by_ids(&[work_id.to_string()])
            .await?;
        for mut work in documents {
            let now = self.core.clock.now();
            work.status = WorkStatus::Open;
            work.released_at = Some(now);
            work.updated_at = now;
            self.core.stores.works.put_work(&work).await?;
        }
        Ok(())
    }

    /// Delete the document, its link, then every bookmark and grant for it.
    /// The first failing step aborts; earlier steps are not undone.
    pub async fn remove(&self, work_id: &str) -> Result<()> {
        if self.core.stores.linkage.work_link(work_id).await?.is_none() {
            return Err(LibraryError::NotFound(format!("work {work_id}")));
        }

        let stores = &self.core.stores;
        let step = |e| log_upstream("remove_work", work_id, e);

        if !stores.works.delete_work(work_id).await.map_err(step)? {
            warn!("Work {} had no document to delete", work_id);
        }
        stores.linkage.delete_work_link(work_id).await.map_err(step)?;
        let bookmarks = stores.linkage.delete_bookmarks(work_id).await.map_err(step)?;
        let grants = stores.linkage.delete_grants(work_id).await.map_err(step)?;

        info!(
            "Removed work {} ({} bookmarks, {} grants)",
            work_id, bookmarks, grants
        );
        Ok(())
    }
}

// ============================================================================
// Views
// ============================================================================

/// A work as returned to one viewer
#[derive(Debug, Clone, Serialize)]
pub struct WorkView {
    pub work: Work,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_info: Option<AuthorInfo>,
    pub bookmarked: bool,
}

/// Result of publishing a work
#[derive(Debug, Clone, Serialize)]
pub struct PublishedWork {
    pub work: Work,
    /// Ledger registration, absent when the ledger call failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

/// What the viewer holds, loaded once per listing
struct ViewerState {
    viewer: Option<Participant>,
    purchased: HashSet<String>,
    bookmarked: HashSet<String>,
}

// ============================================================================
// Service
// ============================================================================

#[derive(Clone)]
pub struct WorkService {
    core: Arc<Core>,
    repository: WorkRepository,
}

impl WorkService {
    pub(crate) fn new(core: Arc<Core>) -> Self {
        Self {
            repository: WorkRepository::new(core.clone()),
            core,
        }
    }

    pub fn repository(&self) -> &WorkRepository {
        &self.repository
    }

    /// Publish a work by an author and register it on the ledger
    pub async fn publish(&self, address: &str, draft: NewWork) -> Result<PublishedWork> {
        let author = self
            .core
            .participant_with_role(address, ParticipantRole::Author)
            .await?;
        draft.validate()?;

        let config = &self.core.config;
        let work = draft.into_work(
            &author.id,
            config.initial_status.status(),
            &config.default_price,
            self.core.clock.now(),
        );
        self.repository.create(&work).await?;
        info!(
            "Published work {} by {} in {}",
            work.id, author.web3_address, work.status
        );

        let tx_hash = match self.register_on_ledger(&author, &work).await {
            Ok(tx_hash) => Some(tx_hash),
            Err(e) => {
                error!("publish_work: ledger registration of {} failed: {}", work.id, e);
                None
            }
        };

        Ok(PublishedWork { work, tx_hash })
    }

    async fn register_on_ledger(&self, author: &Participant, work: &Work) -> Result<String> {
        let request = PublishRequest {
            authors: vec![author.web3_address.clone()],
            name: work.name.clone(),
            uri: format!("urn:scriptorium:work:{}", work.id),
            work_id: ledger_work_id(&work.id)?,
            price: work.price.clone(),
        };
        bounded(
            self.core.config.ledger_timeout,
            "publish_work",
            self.core.ledger.publish_work(&request),
        )
        .await
    }

    /// Admin release of a pre-reviewed work to validators
    pub async fn approve(&self, address: &str, work_id: &str) -> Result<WorkStatus> {
        self.core
            .participant_with_role(address, ParticipantRole::Admin)
            .await?;
        self.repository
            .transition(work_id, WorkTransition::Approve)
            .await
    }

    pub async fn remove(&self, address: &str, work_id: &str) -> Result<()> {
        self.core
            .participant_with_role(address, ParticipantRole::Admin)
            .await?;
        self.repository.remove(work_id).await
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Every work the viewer may see
    pub async fn all(&self, viewer: Option<&str>) -> Result<Vec<WorkView>> {
        let links = self
            .core
            .stores
            .linkage
            .work_links()
            .await
            .map_err(|e| log_upstream("all_works", "every work", e))?;
        let pairs = self.repository.join(links).await?;
        let viewer = self.core.viewer(viewer).await?;
        self.present(viewer, pairs).await
    }

    /// Works matching any of the comma separated keywords
    pub async fn search(&self, viewer: Option<&str>, keywords: &str) -> Result<Vec<WorkView>> {
        let keywords = parse_keywords(keywords);
        if keywords.is_empty() {
            return Err(LibraryError::BadRequest("no search keywords".into()));
        }

        let works = self
            .core
            .stores
            .works
            .works_by_keywords(&keywords)
            .await
            .map_err(|e| log_upstream("search_works", &keywords.join(","), e))?;
        let pairs = self.repository.attach_links(works).await?;
        let viewer = self.core.viewer(viewer).await?;
        self.present(viewer, pairs).await
    }

    pub async fn by_author(
        &self,
        viewer: Option<&str>,
        author_address: &str,
    ) -> Result<Vec<WorkView>> {
        let author = self.core.participant(author_address).await?;
        let links = self
            .core
            .stores
            .linkage
            .work_links_by_author(&author.id)
            .await
            .map_err(|e| log_upstream("works_by_author", author_address, e))?;
        let pairs = self.repository.join(links).await?;
        let viewer = self.core.viewer(viewer).await?;
        self.present(viewer, pairs).await
    }

    /// Single work; unlisted works read as absent
    pub async fn get(&self, viewer: Option<&str>, work_id: &str) -> Result<WorkView> {
        let pair = self.repository.get(work_id).await?;
        let viewer = self.core.viewer(viewer).await?;
        self.present(viewer, vec![pair])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LibraryError::NotFound(format!("work {work_id}")))
    }

    /// Works waiting for admin approval
    pub async fn pending(&self, address: &str) -> Result<Vec<WorkView>> {
        let admin = self
            .core
            .participant_with_role(address, ParticipantRole::Admin)
            .await?;
        let links = self
            .core
            .stores
            .linkage
            .work_links_by_status(WorkStatus::PreReview)
            .await?;
        let pairs = self.repository.join(links).await?;
        self.present(Some(admin), pairs).await
    }

    /// Apply the access policy per work and decorate what remains
    pub(crate) async fn present(
        &self,
        viewer: Option<Participant>,
        pairs: Vec<(Work, WorkLink)>,
    ) -> Result<Vec<WorkView>> {
        let state = self.viewer_state(viewer).await?;
        let mut authors: HashMap<String, Option<AuthorInfo>> = HashMap::new();
        let mut views = Vec::with_capacity(pairs.len());

        for (work, link) in pairs {
            let purchased = state.purchased.contains(&link.work_id);
            let Some(work) = visibility(&link, state.viewer.as_ref(), purchased).apply(work) else {
                continue;
            };

            if !authors.contains_key(&link.participant_id) {
                let info = self.author_of(&link.participant_id).await?;
                authors.insert(link.participant_id.clone(), info);
            }

            views.push(WorkView {
                bookmarked: state.bookmarked.contains(&work.id),
                author_info: authors.get(&link.participant_id).cloned().flatten(),
                work,
            });
        }
        Ok(views)
    }

    async fn viewer_state(&self, viewer: Option<Participant>) -> Result<ViewerState> {
        let Some(participant) = viewer else {
            return Ok(ViewerState {
                viewer: None,
                purchased: HashSet::new(),
                bookmarked: HashSet::new(),
            });
        };

        let linkage = &self.core.stores.linkage;
        let now = self.core.clock.now();
        let window = self.core.config.purchase_window;

        let purchased = linkage
            .grants_by_participant(&participant.id)
            .await?
            .into_iter()
            .filter(|g| g.is_valid_at(now, window))
            .map(|g| g.work_id)
            .collect();
        let bookmarked = linkage
            .bookmarked_work_ids(&participant.id)
            .await?
            .into_iter()
            .collect();

        Ok(ViewerState {
            viewer: Some(participant),
            purchased,
            bookmarked,
        })
    }

    async fn author_of(&self, participant_id: &str) -> Result<Option<AuthorInfo>> {
        let Some(basic_info) = self
            .core
            .stores
            .identity
            .participant_by_id(participant_id)
            .await?
        else {
            return Ok(None);
        };
        let author_info = self.core.stores.profiles.author(participant_id).await?;
        Ok(Some(AuthorInfo {
            basic_info,
            author_info,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;
    use crate::library::{
        InitialWorkStatus, ManualClock, ProfileFields, Registration, Stores, WorkContent,
    };
    use crate::services::{AdminSeed, Library, LibraryConfig};

    const AUTHOR: &str = "0x00000000000000000000000000000000000000a1";
    const ADMIN: &str = "0x00000000000000000000000000000000000000ad";
    const READER: &str = "0x00000000000000000000000000000000000000b0";

    async fn setup(initial_status: InitialWorkStatus) -> (Library, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::new());
        let lib = Library::new(
            Stores::in_memory(),
            ledger.clone(),
            Arc::new(ManualClock::default()),
            LibraryConfig {
                initial_status,
                ..Default::default()
            },
        );
        lib.identity
            .bootstrap_admins(&[AdminSeed {
                nickname: "admin".into(),
                web3_address: ADMIN.into(),
            }])
            .await
            .unwrap();
        for (nickname, address) in [("author", AUTHOR), ("reader", READER)] {
            lib.identity
                .register(Registration {
                    nickname: nickname.into(),
                    web3_address: address.into(),
                })
                .await
                .unwrap();
        }
        lib.identity
            .become_author(
                AUTHOR,
                ProfileFields {
                    email_address: "a@science.org".into(),
                    name: "Ada".into(),
                    surname: "Byron".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        (lib, ledger)
    }

    fn draft(name: &str) -> NewWork {
        NewWork {
            name: name.into(),
            annotation: "An annotation".into(),
            tags: vec![],
            price: String::new(),
            sources: String::new(),
            language: "en".into(),
            content: Some(WorkContent {
                work_data: "full text".into(),
            }),
        }
    }

    #[tokio::test]
    async fn test_publish_registers_on_ledger() {
        let (lib, ledger) = setup(InitialWorkStatus::Review).await;
        let published = lib.works.publish(AUTHOR, draft("Tides")).await.unwrap();

        assert_eq!(published.work.status, WorkStatus::Review);
        assert!(published.tx_hash.is_some());
        let on_chain = ledger
            .published_work(&ledger_work_id(&published.work.id).unwrap())
            .unwrap();
        assert_eq!(on_chain.authors, vec![AUTHOR.to_string()]);
    }

    #[tokio::test]
    async fn test_publish_survives_ledger_outage() {
        let (lib, ledger) = setup(InitialWorkStatus::Review).await;
        ledger.set_unavailable(true);

        let published = lib.works.publish(AUTHOR, draft("Tides")).await.unwrap();
        assert!(published.tx_hash.is_none());
        assert!(lib.works.get(Some(AUTHOR), &published.work.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_reader_cannot_publish() {
        let (lib, _) = setup(InitialWorkStatus::Review).await;
        assert!(matches!(
            lib.works.publish(READER, draft("Tides")).await,
            Err(LibraryError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_approve_gate() {
        let (lib, _) = setup(InitialWorkStatus::PreReview).await;
        let work = lib.works.publish(AUTHOR, draft("Tides")).await.unwrap().work;
        assert_eq!(work.status, WorkStatus::PreReview);

        let pending = lib.works.pending(ADMIN).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert!(matches!(
            lib.works.pending(AUTHOR).await,
            Err(LibraryError::Forbidden(_))
        ));

        assert_eq!(
            lib.works.approve(ADMIN, &work.id).await.unwrap(),
            WorkStatus::Review
        );
        // Approving again is a no-op
        assert_eq!(
            lib.works.approve(ADMIN, &work.id).await.unwrap(),
            WorkStatus::Review
        );
        assert!(lib.works.pending(ADMIN).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_confirm_releases_and_is_final() {
        let (lib, _) = setup(InitialWorkStatus::Review).await;
        let work = lib.works.publish(AUTHOR, draft("Tides")).await.unwrap().work;
        let repo = lib.works.repository();

        assert_eq!(
            repo.transition(&work.id, WorkTransition::Confirm).await.unwrap(),
            WorkStatus::Open
        );
        assert_eq!(
            repo.transition(&work.id, WorkTransition::Decline).await.unwrap(),
            WorkStatus::Open
        );
        assert!(matches!(
            lib.works.approve(ADMIN, &work.id).await,
            Err(LibraryError::Conflict(_))
        ));

        let (released, _) = repo.get(&work.id).await.unwrap();
        assert_eq!(released.status, WorkStatus::Open);
        assert!(released.released_at.is_some());
    }

    #[tokio::test]
    async fn test_anonymous_listing_hides_unreleased_and_content() {
        let (lib, _) = setup(InitialWorkStatus::Review).await;
        let hidden = lib.works.publish(AUTHOR, draft("Hidden")).await.unwrap().work;
        let open = lib.works.publish(AUTHOR, draft("Open")).await.unwrap().work;
        lib.works
            .repository()
            .transition(&open.id, WorkTransition::Confirm)
            .await
            .unwrap();

        let listed = lib.works.all(None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].work.id, open.id);
        assert!(listed[0].work.content.is_none());
        let author = listed[0].author_info.as_ref().unwrap();
        assert_eq!(author.basic_info.web3_address, AUTHOR);

        assert!(matches!(
            lib.works.get(None, &hidden.id).await,
            Err(LibraryError::NotFound(_))
        ));
        let own = lib.works.get(Some(AUTHOR), &hidden.id).await.unwrap();
        assert!(own.work.content.is_some());
    }

    #[tokio::test]
    async fn test_search_applies_visibility() {
        let (lib, _) = setup(InitialWorkStatus::Review).await;
        let open = lib.works.publish(AUTHOR, draft("Monofin drag")).await.unwrap().work;
        lib.works.publish(AUTHOR, draft("Monofin lift")).await.unwrap();
        lib.works
            .repository()
            .transition(&open.id, WorkTransition::Confirm)
            .await
            .unwrap();

        let for_reader = lib.works.search(Some(READER), "monofin").await.unwrap();
        assert_eq!(for_reader.len(), 1);
        let for_author = lib.works.search(Some(AUTHOR), "monofin, drag").await.unwrap();
        assert_eq!(for_author.len(), 2);
        assert!(matches!(
            lib.works.search(None, " , ").await,
            Err(LibraryError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_unknown_work() {
        let (lib, _) = setup(InitialWorkStatus::Review).await;
        assert!(matches!(
            lib.works.remove(ADMIN, "missing").await,
            Err(LibraryError::NotFound(_))
        ));
    }
}
