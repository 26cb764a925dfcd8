//! 修复建议
//!
//! 只对可识别的缺失组件给出固定版本的 SQL 模板，无法识别的失败不给建议。

use super::check::{CheckResult, CheckStatus, Component};
use super::classify::FailureKind;
use indoc::{formatdoc, indoc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 博客表
pub const BLOG_POSTS_TABLE: &str = "blog_posts";
/// 已发布博客表
pub const PUBLISHED_BLOG_POSTS_TABLE: &str = "published_blog_posts";

/// 一条修复建议
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remediation {
    /// 模板 id
    pub id: String,
    /// 模板版本
    pub version: u32,
    pub title: String,
    /// 触发该建议的组件
    pub component: Component,
    /// 可直接在 SQL 编辑器中执行的脚本
    pub script: String,
}

impl Remediation {
    fn new(
        id: &str,
        title: impl Into<String>,
        component: &Component,
        script: impl Into<String>,
    ) -> Self {
        Self {
            id: id.to_string(),
            version: 1,
            title: title.into(),
            component: component.clone(),
            script: script.into(),
        }
    }

    /// `id@version`
    pub fn key(&self) -> String {
        format!("{}@{}", self.id, self.version)
    }
}

const CREATE_BLOG_POSTS_TABLE: &str = indoc! {"
    CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\";

    CREATE TABLE IF NOT EXISTS blog_posts (
      id UUID PRIMARY KEY DEFAULT uuid_generate_v4(),
      user_id UUID REFERENCES auth.users(id),
      title TEXT NOT NULL,
      slug TEXT NOT NULL UNIQUE,
      content TEXT NOT NULL,
      excerpt TEXT,
      meta_description TEXT,
      keywords TEXT[] DEFAULT '{}',
      tags TEXT[] DEFAULT '{}',
      category TEXT DEFAULT 'General',
      target_url TEXT NOT NULL,
      anchor_text TEXT,
      published_url TEXT,
      status TEXT DEFAULT 'draft',
      is_trial_post BOOLEAN DEFAULT false,
      expires_at TIMESTAMP WITH TIME ZONE,
      word_count INTEGER DEFAULT 0,
      created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
      updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
    );

    CREATE INDEX IF NOT EXISTS idx_blog_posts_status ON blog_posts(status);
    CREATE INDEX IF NOT EXISTS idx_blog_posts_trial ON blog_posts(is_trial_post);

    ALTER TABLE blog_posts ENABLE ROW LEVEL SECURITY;
"};

const BLOG_POSTS_RLS_POLICIES: &str = indoc! {"
    ALTER TABLE blog_posts ENABLE ROW LEVEL SECURITY;

    DROP POLICY IF EXISTS \"Anyone can read blog posts\" ON blog_posts;
    CREATE POLICY \"Anyone can read blog posts\" ON blog_posts
      FOR SELECT USING (true);

    DROP POLICY IF EXISTS \"Anyone can create blog posts\" ON blog_posts;
    CREATE POLICY \"Anyone can create blog posts\" ON blog_posts
      FOR INSERT WITH CHECK (true);

    DROP POLICY IF EXISTS \"Owners and trial posts can be deleted\" ON blog_posts;
    CREATE POLICY \"Owners and trial posts can be deleted\" ON blog_posts
      FOR DELETE USING (auth.uid() = user_id OR is_trial_post = true);
"};

const CREATE_PUBLISHED_BLOG_POSTS_TABLE: &str = indoc! {"
    CREATE TABLE IF NOT EXISTS published_blog_posts (
      id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
      user_id UUID REFERENCES auth.users(id),
      title TEXT NOT NULL,
      slug TEXT NOT NULL UNIQUE,
      content TEXT NOT NULL,
      excerpt TEXT,
      meta_description TEXT,
      keywords TEXT[] DEFAULT '{}',
      tags TEXT[] DEFAULT '{}',
      category TEXT DEFAULT 'General',
      target_url TEXT NOT NULL,
      published_url TEXT NOT NULL,
      anchor_text TEXT,
      status TEXT DEFAULT 'published',
      is_trial_post BOOLEAN DEFAULT false,
      is_claimed BOOLEAN DEFAULT false,
      claimed_by UUID REFERENCES auth.users(id),
      claimed_at TIMESTAMP WITH TIME ZONE,
      expires_at TIMESTAMP WITH TIME ZONE,
      view_count INTEGER DEFAULT 0,
      word_count INTEGER DEFAULT 0,
      created_at TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
      updated_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
    );

    ALTER TABLE published_blog_posts ENABLE ROW LEVEL SECURITY;

    CREATE POLICY \"Anyone can read published blog posts\" ON published_blog_posts
      FOR SELECT USING (true);
"};

/// 缺失列的补列语句类型
fn column_type(column: &str) -> &'static str {
    match column {
        "id" => "UUID DEFAULT uuid_generate_v4()",
        "created_at" | "updated_at" => "TIMESTAMP WITH TIME ZONE DEFAULT NOW()",
        "status" => "TEXT DEFAULT 'draft'",
        _ => "TEXT",
    }
}

fn rpc_stub(function: &str) -> String {
    formatdoc! {"
        CREATE OR REPLACE FUNCTION public.{function}()
        RETURNS void
        LANGUAGE plpgsql
        SECURITY DEFINER
        AS $$
        BEGIN
          -- procedure body for {function}
          RETURN;
        END;
        $$;

        GRANT EXECUTE ON FUNCTION public.{function}() TO anon, authenticated;
    ",
        function = function
    }
}

fn add_columns(columns: &[String]) -> String {
    let mut script: String = columns
        .iter()
        .map(|c| {
            format!(
                "ALTER TABLE blog_posts ADD COLUMN IF NOT EXISTS {} {};\n",
                c,
                column_type(c)
            )
        })
        .collect();
    if columns.iter().any(|c| c == "slug") {
        script.push_str("CREATE UNIQUE INDEX IF NOT EXISTS idx_blog_posts_slug ON blog_posts(slug);\n");
    }
    script
}

/// 单个结果匹配到的修复建议
fn match_result(result: &CheckResult) -> Option<Remediation> {
    if result.status == CheckStatus::Success {
        return None;
    }
    let component = &result.component;

    match (result.kind, component) {
        (Some(FailureKind::StructuralMissing), Component::Schema(table))
            if table == BLOG_POSTS_TABLE =>
        {
            match result.detail("missing_columns").and_then(|v| v.as_list()) {
                Some(columns) if !columns.is_empty() => Some(Remediation::new(
                    "add-blog-posts-columns",
                    format!("Add missing columns to {}", table),
                    component,
                    add_columns(columns),
                )),
                _ => Some(Remediation::new(
                    "create-blog-posts-table",
                    "Create the blog_posts table",
                    component,
                    CREATE_BLOG_POSTS_TABLE,
                )),
            }
        }
        (Some(FailureKind::StructuralMissing), Component::Connection) => {
            match result.detail("table").and_then(|v| v.as_text()) {
                Some(BLOG_POSTS_TABLE) => Some(Remediation::new(
                    "create-blog-posts-table",
                    "Create the blog_posts table",
                    component,
                    CREATE_BLOG_POSTS_TABLE,
                )),
                _ => None,
            }
        }
        (
            Some(FailureKind::StructuralMissing),
            Component::Table(table) | Component::Write(table),
        ) => match table.as_str() {
            BLOG_POSTS_TABLE => Some(Remediation::new(
                "create-blog-posts-table",
                "Create the blog_posts table",
                component,
                CREATE_BLOG_POSTS_TABLE,
            )),
            PUBLISHED_BLOG_POSTS_TABLE => Some(Remediation::new(
                "create-published-blog-posts-table",
                "Create the published_blog_posts table",
                component,
                CREATE_PUBLISHED_BLOG_POSTS_TABLE,
            )),
            _ => None,
        },
        (Some(FailureKind::PolicyDenied), Component::Table(table) | Component::Write(table))
            if table == BLOG_POSTS_TABLE =>
        {
            Some(Remediation::new(
                "blog-posts-rls-policies",
                "Allow the blog feature through row-level security on blog_posts",
                component,
                BLOG_POSTS_RLS_POLICIES,
            ))
        }
        (Some(FailureKind::StructuralMissing), Component::Rpc(function)) => Some(Remediation::new(
            "create-rpc-function",
            format!("Create the {} remote procedure", function),
            component,
            rpc_stub(function),
        )),
        _ => None,
    }
}

/// 为检查结果生成修复建议
///
/// 纯函数；同一模板对同一目标只出现一次，顺序跟随结果顺序。
pub fn suggest_remediations(results: &[CheckResult]) -> Vec<Remediation> {
    let mut seen = HashSet::new();
    results
        .iter()
        .filter_map(match_result)
        .filter(|r| {
            let target = match &r.component {
                Component::Rpc(function) => function.clone(),
                _ => String::new(),
            };
            seen.insert((r.key(), target))
        })
        .collect()
}
