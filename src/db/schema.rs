// Copyright 2025 Assistance Micro Design
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

pub const SCHEMA_SQL: &str = r#"
-- Namespace et Database
DEFINE NAMESPACE discusync;
USE NS discusync;
DEFINE DATABASE pipeline;
USE DB pipeline;

-- Table: flow
-- Tenant-configured pipeline: N inputs, M outputs
DEFINE TABLE OVERWRITE flow SCHEMAFULL;
DEFINE FIELD OVERWRITE id ON flow TYPE string;
DEFINE FIELD OVERWRITE tenant_id ON flow TYPE string;
DEFINE FIELD OVERWRITE name ON flow TYPE string
    ASSERT string::len($value) > 0 AND string::len($value) <= 128;
DEFINE FIELD OVERWRITE description ON flow TYPE option<string>;
DEFINE FIELD OVERWRITE available_domains ON flow TYPE array<string> DEFAULT [];
DEFINE FIELD OVERWRITE ai_enabled ON flow TYPE bool DEFAULT true;
DEFINE FIELD OVERWRITE summary_prompt_template ON flow TYPE option<string>;
DEFINE FIELD OVERWRITE task_prompt_template ON flow TYPE option<string>;
DEFINE FIELD OVERWRITE active ON flow TYPE bool DEFAULT true;
DEFINE FIELD OVERWRITE created_at ON flow TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE updated_at ON flow TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE created_by ON flow TYPE string DEFAULT 'system';
DEFINE FIELD OVERWRITE updated_by ON flow TYPE string DEFAULT 'system';

DEFINE INDEX OVERWRITE flow_tenant_idx ON flow FIELDS tenant_id;

-- Table: flow_input
-- One upstream endpoint bound to a flow. For a given source_type the
-- routing key (source_metadata.workspace_id or email_slug) is unique
-- across active inputs.
DEFINE TABLE OVERWRITE flow_input SCHEMAFULL;
DEFINE FIELD OVERWRITE id ON flow_input TYPE string;
DEFINE FIELD OVERWRITE flow_id ON flow_input TYPE string;
DEFINE FIELD OVERWRITE tenant_id ON flow_input TYPE string;
DEFINE FIELD OVERWRITE source_type ON flow_input TYPE string
    ASSERT $value IN ['chat', 'design_email'];
DEFINE FIELD OVERWRITE api_token ON flow_input TYPE string;
DEFINE FIELD OVERWRITE source_metadata ON flow_input FLEXIBLE TYPE object DEFAULT {};
DEFINE FIELD OVERWRITE email_slug ON flow_input TYPE option<string>;
DEFINE FIELD OVERWRITE active ON flow_input TYPE bool DEFAULT true;
DEFINE FIELD OVERWRITE created_at ON flow_input TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE updated_at ON flow_input TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE created_by ON flow_input TYPE string DEFAULT 'system';
DEFINE FIELD OVERWRITE updated_by ON flow_input TYPE string DEFAULT 'system';

DEFINE INDEX OVERWRITE flow_input_flow_idx ON flow_input FIELDS flow_id;
DEFINE INDEX OVERWRITE flow_input_slug_idx ON flow_input FIELDS email_slug;

-- Table: flow_output
-- One downstream task destination. Exactly one active output per flow has
-- is_default = true.
DEFINE TABLE OVERWRITE flow_output SCHEMAFULL;
DEFINE FIELD OVERWRITE id ON flow_output TYPE string;
DEFINE FIELD OVERWRITE flow_id ON flow_output TYPE string;
DEFINE FIELD OVERWRITE tenant_id ON flow_output TYPE string;
DEFINE FIELD OVERWRITE output_type ON flow_output TYPE string DEFAULT 'kb'
    ASSERT $value IN ['kb'];
DEFINE FIELD OVERWRITE name ON flow_output TYPE string
    ASSERT string::len($value) > 0 AND string::len($value) <= 128;
DEFINE FIELD OVERWRITE domain_filter ON flow_output TYPE array<string> DEFAULT [];
DEFINE FIELD OVERWRITE is_default ON flow_output TYPE bool DEFAULT false;
DEFINE FIELD OVERWRITE output_config ON flow_output FLEXIBLE TYPE object DEFAULT {};
DEFINE FIELD OVERWRITE active ON flow_output TYPE bool DEFAULT true;
DEFINE FIELD OVERWRITE created_at ON flow_output TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE updated_at ON flow_output TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE created_by ON flow_output TYPE string DEFAULT 'system';
DEFINE FIELD OVERWRITE updated_by ON flow_output TYPE string DEFAULT 'system';

DEFINE INDEX OVERWRITE flow_output_flow_idx ON flow_output FIELDS flow_id;

-- Table: user_mapping
-- Upstream user id -> knowledge-base user id. The tuple
-- (tenant_id, source_type, source_workspace_id, source_user_id) is unique
-- among active rows; the workspace id isolates tenants whose upstream
-- workspaces reuse identifier spaces.
DEFINE TABLE OVERWRITE user_mapping SCHEMAFULL;
DEFINE FIELD OVERWRITE id ON user_mapping TYPE string;
DEFINE FIELD OVERWRITE tenant_id ON user_mapping TYPE string;
DEFINE FIELD OVERWRITE source_type ON user_mapping TYPE string
    ASSERT $value IN ['chat', 'design_email'];
DEFINE FIELD OVERWRITE source_workspace_id ON user_mapping TYPE string;
DEFINE FIELD OVERWRITE source_user_id ON user_mapping TYPE string;
DEFINE FIELD OVERWRITE source_user_name ON user_mapping TYPE option<string>;
DEFINE FIELD OVERWRITE dest_user_id ON user_mapping TYPE string;
DEFINE FIELD OVERWRITE dest_user_name ON user_mapping TYPE option<string>;
DEFINE FIELD OVERWRITE active ON user_mapping TYPE bool DEFAULT true;
DEFINE FIELD OVERWRITE created_at ON user_mapping TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE updated_at ON user_mapping TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE created_by ON user_mapping TYPE string DEFAULT 'system';
DEFINE FIELD OVERWRITE updated_by ON user_mapping TYPE string DEFAULT 'system';

DEFINE INDEX OVERWRITE user_mapping_scope_idx ON user_mapping
    FIELDS tenant_id, source_type, source_workspace_id;

-- Table: discussion
-- Snapshot of a thread being processed; mutated at each stage transition.
DEFINE TABLE OVERWRITE discussion SCHEMAFULL;
DEFINE FIELD OVERWRITE id ON discussion TYPE string;
DEFINE FIELD OVERWRITE tenant_id ON discussion TYPE string;
DEFINE FIELD OVERWRITE source_type ON discussion TYPE string
    ASSERT $value IN ['chat', 'design_email'];
DEFINE FIELD OVERWRITE source_thread_id ON discussion TYPE string;
DEFINE FIELD OVERWRITE source_url ON discussion TYPE string;
DEFINE FIELD OVERWRITE flow_id ON discussion TYPE option<string>;
DEFINE FIELD OVERWRITE input_id ON discussion TYPE string;
DEFINE FIELD OVERWRITE title ON discussion TYPE string;
DEFINE FIELD OVERWRITE content ON discussion TYPE string;
DEFINE FIELD OVERWRITE author_handle ON discussion TYPE string;
DEFINE FIELD OVERWRITE participants ON discussion TYPE array<string> DEFAULT [];
DEFINE FIELD OVERWRITE status ON discussion TYPE string DEFAULT 'pending'
    ASSERT $value IN ['pending', 'processing', 'analyzed', 'completed', 'failed'];
DEFINE FIELD OVERWRITE thread_data ON discussion FLEXIBLE TYPE option<object>;
DEFINE FIELD OVERWRITE ai_summary ON discussion TYPE option<string>;
DEFINE FIELD OVERWRITE ai_key_points ON discussion TYPE array<string> DEFAULT [];
DEFINE FIELD OVERWRITE ai_tasks ON discussion FLEXIBLE TYPE option<object>;
DEFINE FIELD OVERWRITE notion_task_ids ON discussion TYPE array<string> DEFAULT [];
DEFINE FIELD OVERWRITE sync_job_id ON discussion TYPE option<string>;
DEFINE FIELD OVERWRITE raw_payload ON discussion FLEXIBLE TYPE option<object>;
DEFINE FIELD OVERWRITE metadata ON discussion FLEXIBLE TYPE object DEFAULT {};
DEFINE FIELD OVERWRITE created_at ON discussion TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE updated_at ON discussion TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE created_by ON discussion TYPE string DEFAULT 'system';
DEFINE FIELD OVERWRITE updated_by ON discussion TYPE string DEFAULT 'system';

DEFINE INDEX OVERWRITE discussion_tenant_idx ON discussion FIELDS tenant_id;
DEFINE INDEX OVERWRITE discussion_thread_idx ON discussion FIELDS source_type, source_thread_id;

-- Table: job
-- Ledger of one processing attempt. Retries create a new row (attempts is
-- never incremented in place); once completed_at is set the row is terminal.
DEFINE TABLE OVERWRITE job SCHEMAFULL;
DEFINE FIELD OVERWRITE id ON job TYPE string;
DEFINE FIELD OVERWRITE tenant_id ON job TYPE string;
DEFINE FIELD OVERWRITE discussion_id ON job TYPE string;
DEFINE FIELD OVERWRITE input_id ON job TYPE string;
DEFINE FIELD OVERWRITE flow_id ON job TYPE option<string>;
DEFINE FIELD OVERWRITE status ON job TYPE string DEFAULT 'pending'
    ASSERT $value IN ['pending', 'processing', 'completed', 'failed', 'retrying'];
DEFINE FIELD OVERWRITE stage ON job TYPE string DEFAULT 'ingestion'
    ASSERT $value IN ['ingestion', 'thread_building', 'ai_analysis', 'task_creation', 'notification'];
DEFINE FIELD OVERWRITE attempts ON job TYPE int DEFAULT 0;
DEFINE FIELD OVERWRITE max_attempts ON job TYPE int DEFAULT 3;
DEFINE FIELD OVERWRITE error ON job TYPE option<string>;
DEFINE FIELD OVERWRITE error_stack ON job TYPE option<string>;
DEFINE FIELD OVERWRITE started_at ON job TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE completed_at ON job TYPE option<datetime>;
DEFINE FIELD OVERWRITE processing_time_ms ON job TYPE option<int>;
DEFINE FIELD OVERWRITE task_ids ON job TYPE array<string> DEFAULT [];
DEFINE FIELD OVERWRITE metadata ON job FLEXIBLE TYPE object DEFAULT {};
DEFINE FIELD OVERWRITE created_at ON job TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE updated_at ON job TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE created_by ON job TYPE string DEFAULT 'system';
DEFINE FIELD OVERWRITE updated_by ON job TYPE string DEFAULT 'system';

-- Retry chains are reconstructed by discussion_id, so keep it indexed
DEFINE INDEX OVERWRITE job_discussion_idx ON job FIELDS discussion_id;
DEFINE INDEX OVERWRITE job_status_idx ON job FIELDS status;

-- Table: task_record
-- Local index of created knowledge-base pages. dest_page_id uniquely
-- identifies the external artifact (completion callbacks reverse-look-up
-- through it).
DEFINE TABLE OVERWRITE task_record SCHEMAFULL;
DEFINE FIELD OVERWRITE id ON task_record TYPE string;
DEFINE FIELD OVERWRITE tenant_id ON task_record TYPE string;
DEFINE FIELD OVERWRITE discussion_id ON task_record TYPE string;
DEFINE FIELD OVERWRITE job_id ON task_record TYPE string;
DEFINE FIELD OVERWRITE dest_page_id ON task_record TYPE string;
DEFINE FIELD OVERWRITE dest_page_url ON task_record TYPE string;
DEFINE FIELD OVERWRITE title ON task_record TYPE string;
DEFINE FIELD OVERWRITE description ON task_record TYPE option<string>;
DEFINE FIELD OVERWRITE priority ON task_record TYPE option<string>;
DEFINE FIELD OVERWRITE assignee ON task_record TYPE option<string>;
DEFINE FIELD OVERWRITE source_url ON task_record TYPE string;
DEFINE FIELD OVERWRITE is_multi_task_child ON task_record TYPE bool DEFAULT false;
DEFINE FIELD OVERWRITE task_index ON task_record TYPE option<int>;
DEFINE FIELD OVERWRITE metadata ON task_record FLEXIBLE TYPE object DEFAULT {};
DEFINE FIELD OVERWRITE created_at ON task_record TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE updated_at ON task_record TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE created_by ON task_record TYPE string DEFAULT 'system';
DEFINE FIELD OVERWRITE updated_by ON task_record TYPE string DEFAULT 'system';

DEFINE INDEX OVERWRITE task_record_discussion_idx ON task_record FIELDS discussion_id;
DEFINE INDEX OVERWRITE task_record_page_idx ON task_record FIELDS dest_page_id UNIQUE;

-- Table: config (legacy)
-- Single-destination rows from pre-flow installations. The resolver falls
-- through to this table when no flow input matches.
DEFINE TABLE OVERWRITE config SCHEMAFULL;
DEFINE FIELD OVERWRITE id ON config TYPE string;
DEFINE FIELD OVERWRITE tenant_id ON config TYPE string;
DEFINE FIELD OVERWRITE source_type ON config TYPE string
    ASSERT $value IN ['chat', 'design_email'];
DEFINE FIELD OVERWRITE api_token ON config TYPE string;
DEFINE FIELD OVERWRITE source_metadata ON config FLEXIBLE TYPE object DEFAULT {};
DEFINE FIELD OVERWRITE notion_database_id ON config TYPE string;
DEFINE FIELD OVERWRITE notion_token ON config TYPE string;
DEFINE FIELD OVERWRITE active ON config TYPE bool DEFAULT true;
DEFINE FIELD OVERWRITE created_at ON config TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE updated_at ON config TYPE datetime DEFAULT time::now();
DEFINE FIELD OVERWRITE created_by ON config TYPE string DEFAULT 'system';
DEFINE FIELD OVERWRITE updated_by ON config TYPE string DEFAULT 'system';

DEFINE INDEX OVERWRITE config_tenant_idx ON config FIELDS tenant_id;
"#;
