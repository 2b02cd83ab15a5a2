//! Template variable, question, and workflow execution operations.

use chrono::Utc;

use crate::error::{CoreError, CoreResult};
use crate::model::{
    ExecutionMetadata, ExecutionStatus, GeneratedFile, MatrixTemplateVariable, NewQuestion,
    Question, QuestionTemplateVariable, WorkflowExecution,
};

use super::Store;

impl Store {
    pub async fn insert_template_variable(
        &self,
        matrix_id: i64,
        company_id: i64,
        template_string: String,
        value: String,
    ) -> MatrixTemplateVariable {
        let mut tables = self.tables.write().await;
        let id = tables
            .template_variables
            .insert_with(|id| MatrixTemplateVariable {
                id,
                matrix_id,
                company_id,
                template_string,
                value,
                deleted: false,
                created_at: Utc::now(),
            });
        tables
            .template_variables
            .get(id)
            .cloned()
            .expect("row just inserted")
    }

    pub async fn template_variables_for_matrix(
        &self,
        matrix_id: i64,
    ) -> Vec<MatrixTemplateVariable> {
        let tables = self.tables.read().await;
        tables
            .template_variables
            .iter()
            .filter(|v| v.matrix_id == matrix_id && !v.deleted)
            .cloned()
            .collect()
    }

    /// Non-deleted template variable associations of a question.
    pub async fn question_template_associations(
        &self,
        question_id: i64,
        company_id: i64,
    ) -> Vec<QuestionTemplateVariable> {
        let tables = self.tables.read().await;
        tables
            .question_template_variables
            .iter()
            .filter(|a| {
                a.question_id == question_id && a.company_id == company_id && !a.deleted
            })
            .cloned()
            .collect()
    }

    /// A soft-deleted association eligible for restore, if any.
    pub async fn find_soft_deleted_association(
        &self,
        question_id: i64,
        template_variable_id: i64,
        company_id: i64,
    ) -> Option<QuestionTemplateVariable> {
        let tables = self.tables.read().await;
        let result = tables
            .question_template_variables
            .iter()
            .find(|a| {
                a.question_id == question_id
                    && a.template_variable_id == template_variable_id
                    && a.company_id == company_id
                    && a.deleted
            })
            .cloned();
        result
    }

    pub async fn insert_question_template_association(
        &self,
        question_id: i64,
        template_variable_id: i64,
        company_id: i64,
    ) -> QuestionTemplateVariable {
        let mut tables = self.tables.write().await;
        let id = tables
            .question_template_variables
            .insert_with(|id| QuestionTemplateVariable {
                id,
                question_id,
                template_variable_id,
                company_id,
                deleted: false,
                created_at: Utc::now(),
            });
        tables
            .question_template_variables
            .get(id)
            .cloned()
            .expect("row just inserted")
    }

    pub async fn set_association_deleted(
        &self,
        association_id: i64,
        deleted: bool,
    ) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let assoc = tables
            .question_template_variables
            .get_mut(association_id)
            .ok_or_else(|| CoreError::not_found("template association", association_id))?;
        assoc.deleted = deleted;
        Ok(())
    }

    pub async fn insert_question(&self, new: NewQuestion) -> Question {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = tables.questions.insert_with(|id| Question {
            id,
            matrix_id: new.matrix_id,
            company_id: new.company_id,
            question_text: new.question_text.clone(),
            question_type: new.question_type,
            use_agent_qa: new.use_agent_qa,
            min_answers: new.min_answers,
            max_answers: new.max_answers,
            deleted: false,
            created_at: now,
            updated_at: now,
        });
        tables.questions.get(id).cloned().expect("row just inserted")
    }

    pub async fn get_question(&self, question_id: i64, company_id: i64) -> Option<Question> {
        let tables = self.tables.read().await;
        tables
            .questions
            .get(question_id)
            .filter(|q| q.company_id == company_id && !q.deleted)
            .cloned()
    }

    pub async fn insert_execution(
        &self,
        workflow_id: i64,
        company_id: i64,
    ) -> WorkflowExecution {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = tables.executions.insert_with(|id| WorkflowExecution {
            id,
            workflow_id,
            company_id,
            status: ExecutionStatus::Pending,
            generated_files: Vec::new(),
            total_output_bytes: 0,
            result_metadata: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        });
        tables.executions.get(id).cloned().expect("row just inserted")
    }

    pub async fn get_execution(
        &self,
        execution_id: i64,
        company_id: i64,
    ) -> Option<WorkflowExecution> {
        let tables = self.tables.read().await;
        tables
            .executions
            .get(execution_id)
            .filter(|e| e.company_id == company_id)
            .cloned()
    }

    pub async fn update_execution_status(
        &self,
        execution_id: i64,
        status: ExecutionStatus,
        error_message: Option<String>,
    ) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let exec = tables
            .executions
            .get_mut(execution_id)
            .ok_or_else(|| CoreError::not_found("workflow execution", execution_id))?;
        exec.status = status;
        if error_message.is_some() {
            exec.error_message = error_message;
        }
        exec.updated_at = Utc::now();
        Ok(())
    }

    /// Record manifest extraction results on an execution.
    pub async fn record_execution_results(
        &self,
        execution_id: i64,
        files: Vec<GeneratedFile>,
        metadata: ExecutionMetadata,
    ) -> CoreResult<()> {
        let mut tables = self.tables.write().await;
        let exec = tables
            .executions
            .get_mut(execution_id)
            .ok_or_else(|| CoreError::not_found("workflow execution", execution_id))?;
        exec.total_output_bytes = files.iter().map(|f| f.size).sum();
        exec.generated_files = files;
        exec.status = if metadata.success {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        exec.error_message = metadata.error.clone();
        exec.result_metadata = Some(metadata);
        exec.updated_at = Utc::now();
        Ok(())
    }
}
