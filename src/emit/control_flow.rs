//! Structured control flow: `IF`/`ELSE`/`ENDIF`, `WHILE`/`ENDLOOP`,
//! `BREAK`/`CONTINUE`. The reference compiler keeps a stack of tagged
//! frames so each terminator knows which labels to branch to; this is a
//! direct transliteration of that stack into a Rust enum.
use super::Emitter;
use crate::error::{Error, Result};
use crate::ir::{Instruction, Opcode};
use crate::spirv::module::SpvId;
use crate::spirv::write;

#[derive(Debug, Clone, Copy)]
pub enum ControlFlowFrame {
    IfElse {
        else_label: SpvId,
        end_label: SpvId,
        saw_else: bool,
    },
    Loop {
        header_label: SpvId,
        continue_label: SpvId,
        break_label: SpvId,
    },
}

fn nearest_loop(stack: &[ControlFlowFrame]) -> Option<&ControlFlowFrame> {
    stack.iter().rev().find(|f| matches!(f, ControlFlowFrame::Loop { .. }))
}

pub fn emit_if(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let src = instr
        .srcs
        .first()
        .ok_or(Error::MalformedStream("IF missing condition source"))?;
    let int_ty = emitter.int_ty;
    let cond_vec = emitter.load_source(src, int_ty)?;
    let lane = write::put_composite_extract(&mut emitter.module, int_ty, cond_vec, &[0]);
    let zero = write::put_constant(&mut emitter.module, int_ty, 0);
    let bool_ty = emitter.bool_ty;
    let cmp_op = if instr.opcode == Opcode::IfLogicalZ {
        spirv_headers::Op::IEqual
    } else {
        spirv_headers::Op::INotEqual
    };
    let cond = write::put_alu(&mut emitter.module, cmp_op, bool_ty, &[lane, zero]);

    let then_label = emitter.module.alloc_id();
    let else_label = emitter.module.alloc_id();
    let end_label = emitter.module.alloc_id();

    write::put_selection_merge(&mut emitter.module, end_label);
    write::put_branch_conditional(&mut emitter.module, cond, then_label, else_label);
    label_here(emitter, then_label);

    emitter.control_flow.push(ControlFlowFrame::IfElse {
        else_label,
        end_label,
        saw_else: false,
    });
    Ok(())
}

pub fn emit_else(emitter: &mut Emitter) -> Result<()> {
    match emitter.control_flow.pop() {
        Some(ControlFlowFrame::IfElse {
            else_label,
            end_label,
            ..
        }) => {
            write::put_branch(&mut emitter.module, end_label);
            label_here(emitter, else_label);
            emitter.control_flow.push(ControlFlowFrame::IfElse {
                else_label,
                end_label,
                saw_else: true,
            });
            Ok(())
        }
        _ => Err(Error::UnbalancedControlFlow("ELSE without matching IF")),
    }
}

pub fn emit_end_if(emitter: &mut Emitter) -> Result<()> {
    match emitter.control_flow.pop() {
        Some(ControlFlowFrame::IfElse {
            else_label,
            end_label,
            saw_else,
        }) => {
            if !saw_else {
                write::put_branch(&mut emitter.module, end_label);
                label_here(emitter, else_label);
            }
            write::put_branch(&mut emitter.module, end_label);
            label_here(emitter, end_label);
            Ok(())
        }
        _ => Err(Error::UnbalancedControlFlow("ENDIF without matching IF")),
    }
}

pub fn emit_while(emitter: &mut Emitter) -> Result<()> {
    let header_label = emitter.module.alloc_id();
    let continue_label = emitter.module.alloc_id();
    let break_label = emitter.module.alloc_id();
    let begin_label = emitter.module.alloc_id();

    write::put_branch(&mut emitter.module, header_label);
    label_here(emitter, header_label);
    write::put_loop_merge(&mut emitter.module, break_label, continue_label);
    write::put_branch(&mut emitter.module, begin_label);
    label_here(emitter, begin_label);

    emitter.control_flow.push(ControlFlowFrame::Loop {
        header_label,
        continue_label,
        break_label,
    });
    Ok(())
}

pub fn emit_end_loop(emitter: &mut Emitter) -> Result<()> {
    match emitter.control_flow.pop() {
        Some(ControlFlowFrame::Loop {
            header_label,
            continue_label,
            break_label,
        }) => {
            write::put_branch(&mut emitter.module, continue_label);
            label_here(emitter, continue_label);
            write::put_branch(&mut emitter.module, header_label);
            label_here(emitter, break_label);
            Ok(())
        }
        _ => Err(Error::UnbalancedControlFlow("ENDLOOP without matching WHILE")),
    }
}

pub fn emit_break(emitter: &mut Emitter, instr: &Instruction) -> Result<()> {
    let break_label = match nearest_loop(&emitter.control_flow) {
        Some(ControlFlowFrame::Loop { break_label, .. }) => *break_label,
        _ => return Err(Error::UnbalancedControlFlow("BREAK outside loop")),
    };

    if instr.opcode == Opcode::Break {
        write::put_branch(&mut emitter.module, break_label);
        let dead_label = emitter.module.alloc_id();
        label_here(emitter, dead_label);
    } else {
        let src = instr
            .srcs
            .first()
            .ok_or(Error::MalformedStream("BREAK_LOGICAL missing condition"))?;
        let int_ty = emitter.int_ty;
        let cond_vec = emitter.load_source(src, int_ty)?;
        let lane = write::put_composite_extract(&mut emitter.module, int_ty, cond_vec, &[0]);
        let zero = write::put_constant(&mut emitter.module, int_ty, 0);
        let bool_ty = emitter.bool_ty;
        let cmp_op = if instr.opcode == Opcode::BreakLogicalZ {
            spirv_headers::Op::IEqual
        } else {
            spirv_headers::Op::INotEqual
        };
        let cond = write::put_alu(&mut emitter.module, cmp_op, bool_ty, &[lane, zero]);
        let continue_label = emitter.module.alloc_id();
        write::put_branch_conditional(&mut emitter.module, cond, break_label, continue_label);
        label_here(emitter, continue_label);
    }
    Ok(())
}

pub fn emit_continue(emitter: &mut Emitter) -> Result<()> {
    let continue_label = match nearest_loop(&emitter.control_flow) {
        Some(ControlFlowFrame::Loop { continue_label, .. }) => *continue_label,
        _ => return Err(Error::UnbalancedControlFlow("CONTINUE outside loop")),
    };
    write::put_branch(&mut emitter.module, continue_label);
    let fresh = emitter.module.alloc_id();
    label_here(emitter, fresh);
    Ok(())
}

/// Emits `OpLabel` using a pre-allocated id rather than
/// [`write::put_label`], which always allocates a fresh one.
fn label_here(emitter: &mut Emitter, label: SpvId) {
    use crate::spirv::module::Section;
    let buf = emitter.module.section(Section::Code);
    buf.push_instr(spirv_headers::Op::Label, 2);
    buf.push(label);
}
