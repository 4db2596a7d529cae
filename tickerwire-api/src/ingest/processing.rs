//! Article Processing
//!
//! Enriches an ingested article with a summary, sentiment score, embedding,
//! and topic categories, and re-scores its stock mentions. Everything the
//! provider produces lands through one transactional store call, so an
//! article is never half-processed.

use tickerwire_core::entities::{EntityId, NewsArticle};
use tickerwire_core::error::IngestError;
use tickerwire_storage::{MentionFilter, NewsStore, ProcessingOutcome};

use crate::providers::MlProvider;

/// Run the full enrichment pipeline over one article and persist the
/// result. Returns the processed article.
pub async fn process_article(
    store: &dyn NewsStore,
    ml: &dyn MlProvider,
    article_id: EntityId,
) -> Result<NewsArticle, IngestError> {
    let article = store.article_get(article_id).await?;
    let text = format!("{} {}", article.title, article.content);

    let summary = ml.summarize(&text).await?;
    let sentiment_score = ml.sentiment(&text).await?;
    let embedding = ml.embed(&text).await?;
    let categories = ml.categorize(&text).await?;

    // Mentions with stored context get scored on that context; the rest
    // inherit the article-level score.
    let mentions = store
        .mention_list(&MentionFilter {
            article_id: Some(article_id),
            ..Default::default()
        })
        .await?;
    let mut mention_scores = Vec::with_capacity(mentions.len());
    for mention in &mentions {
        let score = match &mention.context {
            Some(context) => ml.sentiment(context).await?,
            None => sentiment_score,
        };
        mention_scores.push((mention.mention_id, score));
    }

    let processed = store
        .article_apply_processing(
            article_id,
            ProcessingOutcome {
                summary,
                sentiment_score,
                embedding,
                categories,
                mention_scores,
            },
        )
        .await?;

    tracing::info!(
        article_id = %article_id,
        sentiment = sentiment_score,
        mentions = mentions.len(),
        "Article processed"
    );
    Ok(processed)
}
