// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::keyword::{Keyword, KeywordStatus, KeywordUpdate, NewKeyword};
use crate::domain::repositories::keyword_repository::{KeywordRepository, RepositoryError};
use crate::infrastructure::database::entities::keyword as keyword_entity;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, NotSet,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

/// 关键词仓库实现
///
/// 基于SeaORM实现的关键词数据访问层
#[derive(Clone)]
pub struct KeywordRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl KeywordRepositoryImpl {
    /// 创建新的关键词仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

impl From<keyword_entity::Model> for Keyword {
    fn from(model: keyword_entity::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            keyword: model.keyword,
            search_engine: model.search_engine,
            status: model.status.parse().unwrap_or_default(),
            ad_count: model.ad_count,
            link_count: model.link_count,
            html_content: model.html_content,
            error_message: model.error_message,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait]
impl KeywordRepository for KeywordRepositoryImpl {
    async fn create_batch(&self, keywords: Vec<NewKeyword>) -> Result<Vec<Keyword>, RepositoryError> {
        let txn = self.db.begin().await?;
        let now: DateTime<FixedOffset> = Utc::now().into();
        let mut created = Vec::with_capacity(keywords.len());

        for new_keyword in keywords {
            let model = keyword_entity::ActiveModel {
                id: NotSet,
                user_id: Set(new_keyword.user_id),
                keyword: Set(new_keyword.keyword),
                status: Set(KeywordStatus::Pending.to_string()),
                search_engine: Set(new_keyword.search_engine),
                ad_count: Set(None),
                link_count: Set(None),
                html_content: Set(None),
                error_message: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            };
            created.push(model.insert(&txn).await?.into());
        }

        txn.commit().await?;
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Keyword>, RepositoryError> {
        let model = keyword_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn find_by_id_and_user(
        &self,
        id: i64,
        user_id: Uuid,
    ) -> Result<Option<Keyword>, RepositoryError> {
        let model = keyword_entity::Entity::find()
            .filter(keyword_entity::Column::Id.eq(id))
            .filter(keyword_entity::Column::UserId.eq(user_id))
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Into::into))
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Keyword>, RepositoryError> {
        let models = keyword_entity::Entity::find()
            .filter(keyword_entity::Column::UserId.eq(user_id))
            .order_by_desc(keyword_entity::Column::CreatedAt)
            .order_by_desc(keyword_entity::Column::Id)
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Keyword::from).collect())
    }

    async fn apply(&self, id: i64, update: KeywordUpdate) -> Result<(), RepositoryError> {
        let target = update.target_status();
        let sources: Vec<String> = KeywordStatus::allowed_sources(target)
            .iter()
            .map(ToString::to_string)
            .collect();
        let now: DateTime<FixedOffset> = Utc::now().into();

        let statement = keyword_entity::Entity::update_many()
            .col_expr(keyword_entity::Column::Status, Expr::value(target.to_string()))
            .col_expr(keyword_entity::Column::UpdatedAt, Expr::value(now));

        // Status and its fields go out in the same UPDATE
        let statement = match update {
            KeywordUpdate::MarkProcessing => statement.col_expr(
                keyword_entity::Column::ErrorMessage,
                Expr::value(Option::<String>::None),
            ),
            KeywordUpdate::MarkCompleted {
                ad_count,
                link_count,
                html_content,
            } => statement
                .col_expr(keyword_entity::Column::AdCount, Expr::value(Some(ad_count)))
                .col_expr(keyword_entity::Column::LinkCount, Expr::value(Some(link_count)))
                .col_expr(
                    keyword_entity::Column::HtmlContent,
                    Expr::value(Some(html_content)),
                )
                .col_expr(
                    keyword_entity::Column::ErrorMessage,
                    Expr::value(Option::<String>::None),
                ),
            KeywordUpdate::MarkFailed { message } => statement
                .col_expr(keyword_entity::Column::AdCount, Expr::value(Option::<i64>::None))
                .col_expr(
                    keyword_entity::Column::LinkCount,
                    Expr::value(Option::<i64>::None),
                )
                .col_expr(
                    keyword_entity::Column::HtmlContent,
                    Expr::value(Option::<String>::None),
                )
                .col_expr(keyword_entity::Column::ErrorMessage, Expr::value(Some(message))),
        };

        let result = statement
            .filter(keyword_entity::Column::Id.eq(id))
            .filter(keyword_entity::Column::Status.is_in(sources))
            .exec(self.db.as_ref())
            .await?;

        if result.rows_affected > 0 {
            return Ok(());
        }

        match self.find_by_id(id).await? {
            None => Err(RepositoryError::NotFound),
            Some(current) => Err(RepositoryError::InvalidTransition {
                from: current.status,
                to: target,
            }),
        }
    }
}
