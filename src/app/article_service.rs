//! Article use cases: authoring, listing and engagement counters.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

use super::cache::ReadThroughCache;
use crate::domain::{
    AppError, Article, ArticleChanges, ArticleCounter, ArticleId, ArticleRepository,
    ArticleStatus, AuthUser, CreateArticleRequest, Entity, ListQuery, NewArticle,
    PaginatedResponse, UpdateArticleRequest, UserRepository,
};

pub struct ArticleService {
    articles: Arc<dyn ArticleRepository>,
    users: Arc<dyn UserRepository>,
    cache: ReadThroughCache,
}

impl ArticleService {
    #[must_use]
    pub fn new(
        articles: Arc<dyn ArticleRepository>,
        users: Arc<dyn UserRepository>,
        cache: ReadThroughCache,
    ) -> Self {
        Self {
            articles,
            users,
            cache,
        }
    }

    /// Creates an article owned by `actor`.
    ///
    /// # Errors
    ///
    /// `NotFound` if the author no longer exists (e.g. deleted after the
    /// token was issued).
    #[instrument(skip(self, actor, request), fields(author_id = actor.user_id))]
    pub async fn create(
        &self,
        actor: &AuthUser,
        request: CreateArticleRequest,
    ) -> Result<Article, AppError> {
        request.validate().map_err(|e| {
            warn!(error = %e, "Validation failed for create article request");
            AppError::from(e)
        })?;

        if self.users.get_by_id(actor.user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("user {}", actor.user_id)));
        }

        let article = self
            .articles
            .create(&NewArticle {
                title: request.title,
                content: request.content,
                author_id: actor.user_id,
                status: request.status,
            })
            .await?;

        info!(article_id = article.id, "Article created");
        Ok(article)
    }

    /// Reads an article and records the view.
    ///
    /// The snapshot may come from the cache; the returned `view_count` is
    /// always the value produced by the atomic increment.
    #[instrument(skip(self))]
    pub async fn get(&self, id: ArticleId) -> Result<Article, AppError> {
        let mut article = self.find(id).await?;
        article.view_count = self
            .articles
            .increment_counter(id, ArticleCounter::View)
            .await?;
        debug!(article_id = id, views = article.view_count, "View recorded");
        Ok(article)
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        query: &ListQuery<ArticleStatus>,
    ) -> Result<PaginatedResponse<Article>, AppError> {
        self.articles.list(query).await
    }

    /// Partial update. Only the author may edit.
    #[instrument(skip(self, actor, request), fields(actor_id = actor.user_id))]
    pub async fn update(
        &self,
        actor: &AuthUser,
        id: ArticleId,
        request: UpdateArticleRequest,
    ) -> Result<Article, AppError> {
        request.validate()?;

        let current = self.find(id).await?;
        ensure_author(actor, &current)?;

        let changes = ArticleChanges::from(request);
        if changes.is_empty() {
            return Ok(current);
        }

        let updated = self.articles.update(id, &changes).await?;
        self.cache.invalidate(&[Article::cache_key(id)]).await;

        info!(article_id = id, "Article updated");
        Ok(updated)
    }

    #[instrument(skip(self, actor), fields(actor_id = actor.user_id))]
    pub async fn delete(&self, actor: &AuthUser, id: ArticleId) -> Result<(), AppError> {
        let current = self.find(id).await?;
        ensure_author(actor, &current)?;

        self.articles.soft_delete(id).await?;
        self.cache.invalidate(&[Article::cache_key(id)]).await;

        info!(article_id = id, "Article deleted");
        Ok(())
    }

    pub async fn like(&self, id: ArticleId) -> Result<Article, AppError> {
        self.bump(id, ArticleCounter::Like).await
    }

    pub async fn comment(&self, id: ArticleId) -> Result<Article, AppError> {
        self.bump(id, ArticleCounter::Comment).await
    }

    #[instrument(skip(self))]
    async fn bump(&self, id: ArticleId, counter: ArticleCounter) -> Result<Article, AppError> {
        self.articles.increment_counter(id, counter).await?;
        self.cache.invalidate(&[Article::cache_key(id)]).await;
        self.find(id).await
    }

    async fn find(&self, id: ArticleId) -> Result<Article, AppError> {
        self.cache
            .get_entity::<Article, _>(&*self.articles, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("article {id}")))
    }
}

fn ensure_author(actor: &AuthUser, article: &Article) -> Result<(), AppError> {
    if article.author_id != actor.user_id {
        warn!(
            actor_id = actor.user_id,
            article_id = article.id,
            "Non-author modification denied"
        );
        return Err(AppError::Forbidden(
            "only the author may modify this article".to_string(),
        ));
    }
    Ok(())
}
