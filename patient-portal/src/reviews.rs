//! Doctor reviews: card preview, full list and the write form.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::TriageApi;
use crate::error::{PortalError, Result};
use crate::liveness::{LivenessToken, LoadState, track};
use crate::models::{NewReview, Review, UserProfile};
use crate::normalize::normalize_reviews;

pub const RATING_REQUIRED: &str = "Seleziona una valutazione in stelle.";
pub const SUBMIT_FAILED: &str = "Errore nell'invio della recensione. Riprova.";
pub const LOAD_FAILED: &str = "Errore nel caricamento delle recensioni.";
pub const ANONYMOUS_REVIEWER: &str = "Paziente";

const PREVIEW_SIZE: usize = 2;

/// Reviews shown inline on a doctor card.
pub fn preview(reviews: &[Review]) -> &[Review] {
    &reviews[..reviews.len().min(PREVIEW_SIZE)]
}

/// Name shown on a review: the user's full name, or a generic label.
pub fn reviewer_name(user: Option<&UserProfile>) -> String {
    user.map(UserProfile::display_name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| ANONYMOUS_REVIEWER.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModalView {
    List,
    Form,
    /// Terminal: the review was accepted
    Success,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReviewDraft {
    /// 1 to 5 stars; 0 or absent means not chosen
    pub rating: Option<u8>,
    pub comment: String,
}

/// The reviews dialog: list, form and success views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewModal {
    pub doctor_id: i64,
    pub view: ModalView,
    pub reviews: Vec<Review>,
    pub draft: ReviewDraft,
    pub load: LoadState,
    pub submit: LoadState,
}

impl ReviewModal {
    pub fn open(doctor_id: i64, initial: ModalView) -> Self {
        Self {
            doctor_id,
            view: initial,
            reviews: Vec::new(),
            draft: ReviewDraft::default(),
            load: LoadState::Idle,
            submit: LoadState::Idle,
        }
    }

    pub fn write(&mut self) {
        if self.view == ModalView::List {
            self.view = ModalView::Form;
        }
    }

    /// Back to the list, dropping the draft.
    pub fn cancel(&mut self) {
        if self.view == ModalView::Form {
            self.view = ModalView::List;
            self.draft = ReviewDraft::default();
            self.submit = LoadState::Idle;
        }
    }

    pub async fn load_reviews(&mut self, api: &dyn TriageApi, token: &LivenessToken) -> Result<()> {
        let body = track(
            &mut self.load,
            token,
            LOAD_FAILED,
            api.fetch_reviews(self.doctor_id),
        )
        .await?;
        self.reviews = normalize_reviews(&body);
        Ok(())
    }

    /// Send the draft. A missing rating is refused before any request is made.
    pub async fn submit(
        &mut self,
        draft: ReviewDraft,
        user: Option<&UserProfile>,
        api: &dyn TriageApi,
        token: &LivenessToken,
    ) -> Result<()> {
        self.view = ModalView::Form;
        self.draft = draft;
        let rating = match self.draft.rating {
            Some(stars @ 1..=5) => stars,
            _ => {
                self.submit = LoadState::Error(RATING_REQUIRED.to_string());
                return Err(PortalError::validation("rating", RATING_REQUIRED));
            }
        };

        let review = NewReview {
            rating,
            comment: self.draft.comment.trim().to_string(),
            patient_name: reviewer_name(user),
        };
        track(
            &mut self.submit,
            token,
            SUBMIT_FAILED,
            api.post_review(self.doctor_id, &review),
        )
        .await?;

        info!(doctor_id = self.doctor_id, rating, "review posted");
        self.view = ModalView::Success;
        self.draft = ReviewDraft::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockApi;
    use serde_json::json;

    #[test]
    fn preview_keeps_two() {
        let reviews: Vec<Review> = (0..5)
            .map(|i| Review {
                id: i.to_string(),
                ..Default::default()
            })
            .collect();
        assert_eq!(preview(&reviews).len(), 2);
        assert_eq!(preview(&reviews[..1]).len(), 1);
        assert!(preview(&[]).is_empty());
    }

    #[test]
    fn reviewer_defaults_to_paziente() {
        assert_eq!(reviewer_name(None), "Paziente");
        let nameless = UserProfile::default();
        assert_eq!(reviewer_name(Some(&nameless)), "Paziente");
        let user = UserProfile {
            first_name: Some("Anna".into()),
            ..Default::default()
        };
        assert_eq!(reviewer_name(Some(&user)), "Anna");
    }

    #[test]
    fn cancel_returns_to_list() {
        let mut modal = ReviewModal::open(3, ModalView::List);
        modal.write();
        assert_eq!(modal.view, ModalView::Form);
        modal.draft.comment = "bozza".into();
        modal.cancel();
        assert_eq!(modal.view, ModalView::List);
        assert!(modal.draft.comment.is_empty());
    }

    #[tokio::test]
    async fn missing_rating_never_reaches_the_backend() {
        let api = MockApi::new();
        let mut modal = ReviewModal::open(3, ModalView::Form);
        for rating in [None, Some(0), Some(6)] {
            let err = modal
                .submit(
                    ReviewDraft {
                        rating,
                        comment: "ok".into(),
                    },
                    None,
                    api.as_ref(),
                    &LivenessToken::new(),
                )
                .await
                .unwrap_err();
            assert!(matches!(err, PortalError::Validation { .. }));
            assert_eq!(modal.view, ModalView::Form);
        }
        assert_eq!(api.call_count("post_review"), 0);
        assert_eq!(modal.submit.error(), Some(RATING_REQUIRED));
    }

    #[tokio::test]
    async fn accepted_review_ends_in_success() {
        let api = MockApi::new();
        let mut modal = ReviewModal::open(3, ModalView::Form);
        modal
            .submit(
                ReviewDraft {
                    rating: Some(4),
                    comment: " Molto gentile ".into(),
                },
                None,
                api.as_ref(),
                &LivenessToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(modal.view, ModalView::Success);
        let (doctor_id, review) = api.last_review.lock().unwrap().clone().unwrap();
        assert_eq!(doctor_id, 3);
        assert_eq!(review.patient_name, "Paziente");
        assert_eq!(review.comment, "Molto gentile");
    }

    #[tokio::test]
    async fn failed_submit_keeps_the_form() {
        let api = MockApi::new();
        api.fail("post_review");
        let mut modal = ReviewModal::open(3, ModalView::Form);
        let draft = ReviewDraft {
            rating: Some(5),
            comment: "Ottimo".into(),
        };
        assert!(
            modal
                .submit(draft.clone(), None, api.as_ref(), &LivenessToken::new())
                .await
                .is_err()
        );
        assert_eq!(modal.view, ModalView::Form);
        assert_eq!(modal.draft, draft);
        assert_eq!(modal.submit.error(), Some(SUBMIT_FAILED));
    }

    #[tokio::test]
    async fn list_is_normalized() {
        let api = MockApi::new();
        *api.reviews.lock().unwrap() = vec![
            json!({ "id": 1, "patientName": "Luca", "rating": "4", "date": "2025-01-02" }),
            json!({ "rating": 5 }),
        ];
        let mut modal = ReviewModal::open(3, ModalView::List);
        modal.load_reviews(api.as_ref(), &LivenessToken::new()).await.unwrap();
        assert_eq!(modal.reviews.len(), 2);
        assert_eq!(modal.reviews[0].rating, 4.0);
        assert_eq!(modal.reviews[1].id, "1");
    }
}
