//! Prompt builders for each text-generation request the pipeline makes.
//!
//! Prompt wording is not part of the pipeline contract; only the
//! [`PromptKind`] tagging and the inputs threaded through are.

use crate::collaborator::{Prompt, PromptKind};
use crate::decompose::SUBTASK_KEY;
use crate::domain::SubTask;

/// Problem statement used when a submission does not carry one.
pub const DEFAULT_PROBLEM: &str = r#"Please act as a professional verilog designer.

Implement a 16-bit divider module, the dividend is 16-bit and the divider is 8-bit in combinational logic. Extract the higher bits of the dividend, matching the bit width of the divisor. Compare these bits with the divisor: if the dividend bits are greater, set the quotient to 1, otherwise set it to 0, and use the difference as the remainder. Concatenate the remainder with the highest remaining 1-bit of the dividend, and repeat the process until all dividend bits are processed.

Module name:
    div_16bit

Input ports:
    A: 16-bit dividend.
    B: 8-bit divisor.

Output ports:
    result: 16-bit quotient.
    odd: 16-bit remainder.

Implementation:
The module uses two always blocks to perform the division operation.
The first always block is a combinational block triggered by any change in the input values A and B. It updates the values of two registers, a_reg and b_reg, with the values of A and B, respectively.
The second always block is also a combinational block triggered by any change in the input values A and B.

Give me the complete code.
"#;

pub fn planning(problem: &str) -> Prompt {
    Prompt::new(
        PromptKind::Planning,
        format!(
            "You are a hardware architect. Break the following design problem into \
             sub-modules that can each be written independently.\n\n\
             Problem:\n{problem}\n\n\
             Answer with a fenced ```json block holding an object with a \"{SUBTASK_KEY}\" \
             list. Each entry has \"id\" (1-based), \"content\" (what to build) and \
             \"source\" (the part of the problem it satisfies)."
        ),
    )
}

pub fn planning_revision(problem: &str, previous: &str, feedback: &str) -> Prompt {
    Prompt::new(
        PromptKind::PlanningRevision,
        format!(
            "Revise this decomposition of the design problem below using the reviewer's \
             feedback. Keep the same ```json format with a \"{SUBTASK_KEY}\" list.\n\n\
             Problem:\n{problem}\n\n\
             Previous plan:\n{previous}\n\n\
             Feedback:\n{feedback}"
        ),
    )
}

pub fn subtask(task: &SubTask) -> Prompt {
    Prompt::new(
        PromptKind::Subtask,
        format!(
            "Convert this sub-task into synthesizable Verilog.\n\n\
             Sub-task {}:\n{}\n\n\
             Requirement it satisfies:\n{}\n\n\
             Only return the Verilog code for this step.",
            task.id, task.content, task.source
        ),
    )
}

pub fn testbench(problem: &str, design: &str) -> Prompt {
    Prompt::new(
        PromptKind::Testbench,
        format!(
            "Write a self-checking Verilog testbench for the design below. Print a clear \
             pass or fail line for every check and call $finish at the end.\n\n\
             Problem:\n{problem}\n\n\
             Design:\n{design}\n\n\
             Only return the testbench code."
        ),
    )
}

pub fn testbench_revision(design: &str, previous: &str, feedback: &str) -> Prompt {
    Prompt::new(
        PromptKind::TestbenchRevision,
        format!(
            "Revise this testbench using the reviewer's feedback.\n\n\
             Design:\n{design}\n\n\
             Testbench:\n{previous}\n\n\
             Feedback:\n{feedback}\n\n\
             Only return the testbench code."
        ),
    )
}

pub fn design_repair(content: &str, suggestions: &str) -> Prompt {
    Prompt::new(
        PromptKind::DesignRepair,
        format!(
            "Fix the Verilog design below. Apply these suggestions from the last \
             simulation run:\n{suggestions}\n\n\
             Design:\n{content}\n\n\
             Return the complete corrected design only."
        ),
    )
}

pub fn testbench_repair(content: &str, suggestions: &str) -> Prompt {
    Prompt::new(
        PromptKind::TestbenchRepair,
        format!(
            "Fix the Verilog testbench below. Apply these suggestions from the last \
             simulation run:\n{suggestions}\n\n\
             Testbench:\n{content}\n\n\
             Return the complete corrected testbench only."
        ),
    )
}

/// Asks a reviewer to turn raw simulator output into the fenced JSON report.
pub fn verification_review(design: &str, testbench: &str, outcome: &str) -> Prompt {
    Prompt::new(
        PromptKind::VerificationReview,
        format!(
            "You review Icarus Verilog results. Using the simulator outcome below, answer \
             with a fenced ```json block of the form\n\
             {{\"status\": \"success|error\", \"stage\": \"file_reading|compilation|simulation|process\", \
             \"files\": {{\"design\": {{\"content\": \"...\", \"suggestions\": \"...\"}}, \
             \"testbench\": {{\"content\": \"...\", \"suggestions\": \"...\"}}}}, \
             \"log\": \"...\", \"timestamp\": \"...\"}}\n\
             Leave \"suggestions\" empty for a file that needs no change.\n\n\
             Simulator outcome:\n{outcome}\n\n\
             Design:\n{design}\n\n\
             Testbench:\n{testbench}"
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_carry_their_kind_and_inputs() {
        let p = design_repair("module m; endmodule", "widen the output");
        assert_eq!(p.kind, PromptKind::DesignRepair);
        assert!(p.text.contains("widen the output"));
        assert!(p.text.contains("module m; endmodule"));

        let t = subtask(&SubTask::new(3, "Comparator", "compare high bits"));
        assert_eq!(t.kind, PromptKind::Subtask);
        assert!(t.text.contains("Sub-task 3"));
        assert!(t.text.contains("compare high bits"));
    }

    #[test]
    fn test_planning_prompt_names_subtask_key() {
        let p = planning(DEFAULT_PROBLEM);
        assert!(p.text.contains("\"Sub-Task\""));
        assert!(p.text.contains("div_16bit"));
    }
}
