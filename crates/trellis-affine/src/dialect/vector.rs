//! `vector` dialect: transfers between memrefs and vectors.

use trellis_ir::{
    AffineMap, Attribute, DialectOp, IrContext, Location, MemoryAccess, OpDescriptor, OpRef,
    OpRegistry, OpTrait, OperationDataBuilder, TypeRef, ValueRef, VerifyError, define_op, symbols,
};

symbols! {
    VECTOR => "vector",
    TRANSFER_READ => "transfer_read",
    TRANSFER_WRITE => "transfer_write",
    ATTR_PERMUTATION_MAP => "permutation_map",
}

define_op! {
    /// `vector.transfer_read %memref[%i, ...] : vector<..>`.
    pub struct TransferRead = "vector"."transfer_read";
}

define_op! {
    /// `vector.transfer_write %vec, %memref[%i, ...]`.
    pub struct TransferWrite = "vector"."transfer_write";
}

pub(crate) fn register(registry: &mut OpRegistry) {
    registry.register(
        OpDescriptor::new(VECTOR(), TRANSFER_READ())
            .with_traits([OpTrait::AtLeastNOperands(1), OpTrait::OneResult])
            .with_verifier(verify_transfer_read)
            .with_memory_access(MemoryAccess::read(0).transfer()),
    );
    registry.register(
        OpDescriptor::new(VECTOR(), TRANSFER_WRITE())
            .with_traits([OpTrait::AtLeastNOperands(2), OpTrait::ZeroResults])
            .with_verifier(verify_transfer_write)
            .with_memory_access(MemoryAccess::write(1).transfer()),
    );
}

fn verify_transfer(
    ctx: &IrContext,
    op: OpRef,
    access: MemoryAccess,
    vector_ty: TypeRef,
) -> Result<(), VerifyError> {
    let memref_ty = ctx.value_ty(access.memref(ctx, op));
    if !ctx.types.is_memref(memref_ty) {
        return Err(VerifyError::new(ctx, op, "requires memref type"));
    }
    if !ctx.types.is_vector(vector_ty) {
        return Err(VerifyError::new(ctx, op, "requires vector type"));
    }
    let rank = ctx.types.shape(memref_ty).map_or(0, |s| s.len());
    if access.indices(ctx, op).len() != rank {
        return Err(VerifyError::new(
            ctx,
            op,
            format!("requires {rank} indices"),
        ));
    }
    if let Some(Attribute::AffineMap(map)) = ctx.op_attr(op, ATTR_PERMUTATION_MAP())
        && map.num_inputs() as usize != rank
    {
        return Err(VerifyError::new(
            ctx,
            op,
            "requires a permutation_map with input dims of the same rank as the memref type",
        ));
    }
    Ok(())
}

fn verify_transfer_read(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    verify_transfer(ctx, op, MemoryAccess::read(0), ctx.op_result_types(op)[0])
}

fn verify_transfer_write(ctx: &IrContext, op: OpRef) -> Result<(), VerifyError> {
    let vector_ty = ctx.value_ty(ctx.op_operand(op, 0));
    verify_transfer(ctx, op, MemoryAccess::write(1), vector_ty)
}

/// Create a detached `vector.transfer_read` producing `vector_ty`.
pub fn transfer_read(
    ctx: &mut IrContext,
    location: Location,
    vector_ty: TypeRef,
    memref: ValueRef,
    indices: &[ValueRef],
    permutation_map: Option<AffineMap>,
) -> TransferRead {
    let mut builder = OperationDataBuilder::new(location, VECTOR(), TRANSFER_READ())
        .operand(memref)
        .operands(indices.iter().copied())
        .result(vector_ty);
    if let Some(map) = permutation_map {
        builder.insert_attr(ATTR_PERMUTATION_MAP(), Attribute::AffineMap(map));
    }
    let data = builder.build(ctx);
    TransferRead::wrap_unchecked(ctx.create_op(data))
}

pub fn transfer_write(
    ctx: &mut IrContext,
    location: Location,
    vector: ValueRef,
    memref: ValueRef,
    indices: &[ValueRef],
) -> TransferWrite {
    let data = OperationDataBuilder::new(location, VECTOR(), TRANSFER_WRITE())
        .operands([vector, memref])
        .operands(indices.iter().copied())
        .build(ctx);
    TransferWrite::wrap_unchecked(ctx.create_op(data))
}

impl TransferRead {
    pub fn memref(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operand(self.0, 0)
    }

    pub fn vector(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_result(self.0, 0)
    }
}

impl TransferWrite {
    pub fn vector(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operand(self.0, 0)
    }

    pub fn memref(&self, ctx: &IrContext) -> ValueRef {
        ctx.op_operand(self.0, 1)
    }
}
