//! Branch hierarchy service: listing, scope resolution, creation and re-parenting

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Branch, BranchRow, BranchTree, Capability, RequestContext};
use crate::services::store;

/// Branch service
#[derive(Clone)]
pub struct BranchService {
    db: PgPool,
}

/// Input for creating a branch
#[derive(Debug, Deserialize)]
pub struct CreateBranchInput {
    pub code: String,
    pub name: String,
    pub parent_id: Option<Uuid>,
}

/// The caller's position in the hierarchy
#[derive(Debug, Serialize)]
pub struct ScopeView {
    pub branch_id: Uuid,
    pub is_head: bool,
    pub ancestors: Vec<Uuid>,
    pub children: Vec<Branch>,
    pub branches: Vec<Branch>,
}

impl BranchService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Branches the caller may view
    pub async fn list(&self, ctx: &RequestContext) -> AppResult<Vec<Branch>> {
        let mut conn = self.db.acquire().await?;
        let tree = store::load_tree(&mut conn).await?;
        Ok(Self::in_scope(&tree, ctx))
    }

    fn in_scope(tree: &BranchTree, ctx: &RequestContext) -> Vec<Branch> {
        tree.branches()
            .iter()
            .filter(|b| ctx.scope.contains(b.id))
            .cloned()
            .collect()
    }

    pub async fn scope(&self, ctx: &RequestContext) -> AppResult<ScopeView> {
        let mut conn = self.db.acquire().await?;
        let tree = store::load_tree(&mut conn).await?;
        let home = tree.get(ctx.branch_id)?;

        Ok(ScopeView {
            branch_id: home.id,
            is_head: home.is_head(),
            ancestors: tree.ancestors(home.id)?,
            children: tree.children(home.id)?.into_iter().cloned().collect(),
            branches: Self::in_scope(&tree, ctx),
        })
    }

    pub async fn create(&self, ctx: &RequestContext, input: CreateBranchInput) -> AppResult<Branch> {
        ctx.require(Capability::ManageBranches)?;
        let code = shared::normalize_branch_code(&input.code)?;
        let name = shared::require_text("name", &input.name)?;

        let mut tx = self.db.begin().await?;
        // Serialize hierarchy edits so cycle checks see a stable tree
        sqlx::query("LOCK TABLE branches IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let mut branches = store::load_tree(&mut tx).await?.branches().to_vec();
        if let Some(parent_id) = input.parent_id {
            ctx.ensure_in_scope(parent_id)?;
        }
        let branch = Branch {
            id: Uuid::new_v4(),
            code,
            name,
            parent_id: input.parent_id,
            created_at: Utc::now(),
        };
        branches.push(branch.clone());
        BranchTree::build(branches)?;

        let row = sqlx::query_as::<_, BranchRow>(
            r#"
            INSERT INTO branches (id, code, name, parent_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, code, name, parent_id, created_at
            "#,
        )
        .bind(branch.id)
        .bind(&branch.code)
        .bind(&branch.name)
        .bind(branch.parent_id)
        .bind(branch.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(branch_id = %row.id, code = %row.code, "Branch created");
        Ok(row.into())
    }

    /// Move a branch under a new parent, or make it a head branch with `None`
    pub async fn move_branch(
        &self,
        ctx: &RequestContext,
        branch_id: Uuid,
        new_parent: Option<Uuid>,
    ) -> AppResult<Branch> {
        ctx.require(Capability::ManageBranches)?;
        ctx.ensure_in_scope(branch_id)?;
        if let Some(parent_id) = new_parent {
            ctx.ensure_in_scope(parent_id)?;
        }

        let mut tx = self.db.begin().await?;
        sqlx::query("LOCK TABLE branches IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;

        let tree = store::load_tree(&mut tx).await?;
        if let Err(err) = tree.validate_reparent(branch_id, new_parent) {
            tracing::warn!(%branch_id, ?new_parent, error = %err, "Branch move rejected");
            return Err(err.into());
        }

        let row = sqlx::query_as::<_, BranchRow>(
            r#"
            UPDATE branches SET parent_id = $2
            WHERE id = $1
            RETURNING id, code, name, parent_id, created_at
            "#,
        )
        .bind(branch_id)
        .bind(new_parent)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(%branch_id, ?new_parent, "Branch moved");
        Ok(row.into())
    }
}
